//! `DuckDB` backend — the derived analytical store.
//!
//! A columnar mirror of the authoritative `SQLite` tables, optimized for the
//! aggregate scans the drill-down queries run. It has no independent write
//! authority: every row lands here as a best-effort copy after the `SQLite`
//! commit, and the startup backfill repairs whatever the mirror missed.
//!
//! `DuckDB` connections are not `Sync`, so the store serializes access
//! through a mutex; the analytics read path is a handful of aggregate
//! queries per dashboard load, not a hot path.

use std::collections::HashSet;
use std::path::Path;

use duckdb::{params, Connection};
use parking_lot::Mutex;

use crate::errors::Result;
use crate::row_types::{EventRow, SessionRow};

/// Executed once at database open. All statements are idempotent so re-open
/// is safe. Minimal indexing: `DuckDB` zone maps cover the aggregate scans.
const INIT_SQL: &str = "
SET threads = 2;

CREATE TABLE IF NOT EXISTS sessions (
  id                 VARCHAR PRIMARY KEY,
  created_at         VARCHAR NOT NULL,
  updated_at         VARCHAR NOT NULL,
  user_ident         VARCHAR NOT NULL,
  browser            VARCHAR NOT NULL DEFAULT '',
  browser_major      VARCHAR NOT NULL DEFAULT '',
  browser_minor      VARCHAR NOT NULL DEFAULT '',
  browser_patch      VARCHAR NOT NULL DEFAULT '',
  os                 VARCHAR NOT NULL DEFAULT '',
  os_major           VARCHAR NOT NULL DEFAULT '',
  os_minor           VARCHAR NOT NULL DEFAULT '',
  os_patch           VARCHAR NOT NULL DEFAULT '',
  country            VARCHAR NOT NULL DEFAULT '',
  user_agent         VARCHAR NOT NULL DEFAULT '',
  referrer           VARCHAR NOT NULL DEFAULT '(none)',
  referrer_full_path VARCHAR NOT NULL DEFAULT '',
  session_start      BIGINT NOT NULL,
  session_end        BIGINT NOT NULL,
  screen_width       BIGINT NOT NULL DEFAULT 0,
  events             BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS events (
  id         VARCHAR PRIMARY KEY,
  created_at VARCHAR NOT NULL,
  updated_at VARCHAR NOT NULL,
  name       VARCHAR NOT NULL,
  page       VARCHAR NOT NULL,
  event_time BIGINT NOT NULL,
  session_id VARCHAR NOT NULL
);
";

/// Handle to one tenant's analytical database.
pub struct AnalyticStore {
    conn: Mutex<Connection>,
}

impl AnalyticStore {
    /// Open (or create) the database file and run the idempotent schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(INIT_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for testing.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(INIT_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the underlying connection.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Mirror a session row. `INSERT OR REPLACE` keeps the mirror converging
    /// on the authoritative state even when the same session is extended
    /// repeatedly.
    pub fn upsert_session(&self, session: &SessionRow) -> Result<()> {
        self.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT OR REPLACE INTO sessions
                   (id, created_at, updated_at, user_ident,
                    browser, browser_major, browser_minor, browser_patch,
                    os, os_major, os_minor, os_patch,
                    country, user_agent, referrer, referrer_full_path,
                    session_start, session_end, screen_width, events)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                         ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
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
            Ok(())
        })
    }

    /// Mirror an event row; duplicates are ignored.
    pub fn insert_event(&self, event: &EventRow) -> Result<()> {
        self.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT OR IGNORE INTO events
                   (id, created_at, updated_at, name, page, event_time, session_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
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
            Ok(())
        })
    }

    /// All mirrored session ids. The backfill preloads this set to skip
    /// rows already present.
    pub fn session_ids(&self) -> Result<HashSet<String>> {
        self.collect_ids("SELECT id FROM sessions")
    }

    /// All mirrored event ids.
    pub fn event_ids(&self) -> Result<HashSet<String>> {
        self.collect_ids("SELECT id FROM events")
    }

    /// Mirrored session count, for parity checks.
    pub fn session_count(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM sessions")
    }

    /// Mirrored event count, for parity checks.
    pub fn event_count(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM events")
    }

    fn collect_ids(&self, sql: &str) -> Result<HashSet<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            Ok(ids)
        })
    }

    fn count(&self, sql: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(count)
        })
    }
}
