//! Event repository — append-only `events` rows in the authoritative store.
//!
//! Event ids are minted at enqueue time, so a redelivered queue item carries
//! the same id and `INSERT OR IGNORE` makes the write idempotent.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::errors::Result;
use crate::row_types::EventRow;

/// Event repository — stateless, every method takes `&Connection`.
pub struct EventRepo;

const EVENT_COLUMNS: &str = "id, created_at, updated_at, name, page, event_time, session_id";

impl EventRepo {
    /// Insert an event row; a row with the same id already present is left
    /// untouched. Returns whether a row was actually written — the caller
    /// uses this to decide whether the owning session's counters move.
    pub fn insert(conn: &Connection, event: &EventRow) -> Result<bool> {
        let changed = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO events ({EVENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params![
                event.id,
                event.created_at,
                event.updated_at,
                event.name,
                event.page,
                event.event_time,
                event.session_id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Get an event by id.
    pub fn get(conn: &Connection, event_id: &str) -> Result<Option<EventRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![event_id],
                map_event,
            )
            .optional()?;
        Ok(row)
    }

    /// Total event count. Used for backfill parity checks.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// One keyset-paginated batch in stable `(created_at, id)` order.
    pub fn list_batch(
        conn: &Connection,
        after: Option<(&str, &str)>,
        limit: u32,
    ) -> Result<Vec<EventRow>> {
        let (created_at, id) = after.unwrap_or(("", ""));
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE (created_at, id) > (?1, ?2)
             ORDER BY created_at, id
             LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(params![created_at, id, limit], map_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn map_event(row: &Row<'_>) -> std::result::Result<EventRow, rusqlite::Error> {
    Ok(EventRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        name: row.get(3)?,
        page: row.get(4)?,
        event_time: row.get(5)?,
        session_id: row.get(6)?,
    })
}
