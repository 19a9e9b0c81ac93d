//! Session repository — lifecycle of `sessions` rows in the authoritative
//! store.
//!
//! Sessions carry a deterministic id, so creation uses `INSERT OR IGNORE`:
//! a redelivered first-event of a session re-creates the same row instead of
//! splitting the visit.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::errors::Result;
use crate::row_types::SessionRow;

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

const SESSION_COLUMNS: &str = "id, created_at, updated_at, user_ident, \
     browser, browser_major, browser_minor, browser_patch, \
     os, os_major, os_minor, os_patch, \
     country, user_agent, referrer, referrer_full_path, \
     session_start, session_end, screen_width, events";

impl SessionRepo {
    /// The open session for an identity, if its `session_end` is at or after
    /// the cutoff (event time minus the inactivity window). The most
    /// recently extended session wins if several qualify.
    pub fn find_open(
        conn: &Connection,
        user_ident: &str,
        cutoff_unix: i64,
    ) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE user_ident = ?1 AND session_end >= ?2
                     ORDER BY session_end DESC LIMIT 1"
                ),
                params![user_ident, cutoff_unix],
                map_session,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert a session row; a row with the same id already present is left
    /// untouched. Returns whether a row was actually written.
    pub fn insert(conn: &Connection, session: &SessionRow) -> Result<bool> {
        let changed = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO sessions ({SESSION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                         ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
            ),
            params![
                session.id,
                session.created_at,
                session.updated_at,
                session.user_ident,
                session.browser,
                session.browser_major,
                session.browser_minor,
                session.browser_patch,
                session.os,
                session.os_major,
                session.os_minor,
                session.os_patch,
                session.country,
                session.user_agent,
                session.referrer,
                session.referrer_full_path,
                session.session_start,
                session.session_end,
                session.screen_width,
                session.events,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Extend a session for one more event: `session_end` advances (never
    /// regresses) and the event counter increments.
    pub fn extend(
        conn: &Connection,
        session_id: &str,
        event_time_unix: i64,
        updated_at: &str,
    ) -> Result<()> {
        let _ = conn.execute(
            "UPDATE sessions
             SET session_end = MAX(session_end, ?2),
                 events = events + 1,
                 updated_at = ?3
             WHERE id = ?1",
            params![session_id, event_time_unix, updated_at],
        )?;
        Ok(())
    }

    /// Get a session by id.
    pub fn get(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![session_id],
                map_session,
            )
            .optional()?;
        Ok(row)
    }

    /// Total session count. Used for backfill parity checks.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// One keyset-paginated batch in stable `(created_at, id)` order.
    /// `after` is the last key of the previous batch, or `None` to start.
    pub fn list_batch(
        conn: &Connection,
        after: Option<(&str, &str)>,
        limit: u32,
    ) -> Result<Vec<SessionRow>> {
        let (created_at, id) = after.unwrap_or(("", ""));
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE (created_at, id) > (?1, ?2)
             ORDER BY created_at, id
             LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(params![created_at, id, limit], map_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn map_session(row: &Row<'_>) -> std::result::Result<SessionRow, rusqlite::Error> {
    Ok(SessionRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        user_ident: row.get(3)?,
        browser: row.get(4)?,
        browser_major: row.get(5)?,
        browser_minor: row.get(6)?,
        browser_patch: row.get(7)?,
        os: row.get(8)?,
        os_major: row.get(9)?,
        os_minor: row.get(10)?,
        os_patch: row.get(11)?,
        country: row.get(12)?,
        user_agent: row.get(13)?,
        referrer: row.get(14)?,
        referrer_full_path: row.get(15)?,
        session_start: row.get(16)?,
        session_end: row.get(17)?,
        screen_width: row.get(18)?,
        events: row.get(19)?,
    })
}
