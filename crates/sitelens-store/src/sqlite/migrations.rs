//! Schema migration runner for the authoritative store.
//!
//! Migrations run in version order, each inside its own transaction — a
//! failure rolls back cleanly with no partial schema state. The
//! `schema_version` table tracks which migrations have been applied, so
//! running the migrator is idempotent.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};

/// A single migration with a version number and SQL to execute.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const V001_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
  id                 TEXT PRIMARY KEY,
  created_at         TEXT NOT NULL,
  updated_at         TEXT NOT NULL,
  user_ident         TEXT NOT NULL,
  browser            TEXT NOT NULL DEFAULT '',
  browser_major      TEXT NOT NULL DEFAULT '',
  browser_minor      TEXT NOT NULL DEFAULT '',
  browser_patch      TEXT NOT NULL DEFAULT '',
  os                 TEXT NOT NULL DEFAULT '',
  os_major           TEXT NOT NULL DEFAULT '',
  os_minor           TEXT NOT NULL DEFAULT '',
  os_patch           TEXT NOT NULL DEFAULT '',
  country            TEXT NOT NULL DEFAULT '',
  user_agent         TEXT NOT NULL DEFAULT '',
  referrer           TEXT NOT NULL DEFAULT '(none)',
  referrer_full_path TEXT NOT NULL DEFAULT '',
  session_start      INTEGER NOT NULL,
  session_end        INTEGER NOT NULL,
  screen_width       INTEGER NOT NULL DEFAULT 0,
  events             INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS events (
  id         TEXT PRIMARY KEY,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  name       TEXT NOT NULL,
  page       TEXT NOT NULL,
  event_time INTEGER NOT NULL,
  session_id TEXT NOT NULL REFERENCES sessions(id)
);

-- Session lookup by identity within the inactivity window.
CREATE INDEX IF NOT EXISTS idx_sessions_ident_end
  ON sessions(user_ident, session_end);

-- Period-scoped dimension scans.
CREATE INDEX IF NOT EXISTS idx_sessions_start_browser
  ON sessions(session_start, browser);
CREATE INDEX IF NOT EXISTS idx_sessions_start_os
  ON sessions(session_start, os);
CREATE INDEX IF NOT EXISTS idx_sessions_start_country
  ON sessions(session_start, country);
CREATE INDEX IF NOT EXISTS idx_sessions_start_referrer
  ON sessions(session_start, referrer);
CREATE INDEX IF NOT EXISTS idx_sessions_start_end
  ON sessions(session_start, session_end);

-- Drill-down chains.
CREATE INDEX IF NOT EXISTS idx_sessions_browser_major
  ON sessions(browser, browser_major);
CREATE INDEX IF NOT EXISTS idx_sessions_browser_minor
  ON sessions(browser_major, browser_minor);
CREATE INDEX IF NOT EXISTS idx_sessions_browser_patch
  ON sessions(browser_minor, browser_patch);
CREATE INDEX IF NOT EXISTS idx_sessions_os_major
  ON sessions(os, os_major);
CREATE INDEX IF NOT EXISTS idx_sessions_os_minor
  ON sessions(os_major, os_minor);
CREATE INDEX IF NOT EXISTS idx_sessions_os_patch
  ON sessions(os_minor, os_patch);
CREATE INDEX IF NOT EXISTS idx_sessions_referrer_path
  ON sessions(referrer, referrer_full_path);

-- Event scans by owning session and by page.
CREATE INDEX IF NOT EXISTS idx_events_session_name
  ON events(session_id, name);
CREATE INDEX IF NOT EXISTS idx_events_name_session_page
  ON events(name, session_id, page);
CREATE INDEX IF NOT EXISTS idx_events_page
  ON events(page);

-- Backfill batching order.
CREATE INDEX IF NOT EXISTS idx_sessions_created_id
  ON sessions(created_at, id);
CREATE INDEX IF NOT EXISTS idx_events_created_id
  ON events(created_at, id);
";

/// Older deployments stored an empty string where the `(none)` referrer
/// sentinel now applies.
const V002_REFERRER_SENTINEL: &str = "
UPDATE sessions SET referrer = '(none)' WHERE referrer = '';
";

/// All migrations in version order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Complete schema — sessions, events, indexes",
        sql: V001_SCHEMA,
    },
    Migration {
        version: 2,
        description: "Normalize legacy empty referrer values",
        sql: V002_REFERRER_SENTINEL,
    },
];

/// Run all pending migrations on the given connection.
///
/// Creates the `schema_version` table if it doesn't exist, then applies
/// each migration whose version exceeds the current maximum. Returns the
/// number of migrations applied.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version <= current {
            debug!(
                version = migration.version,
                description = migration.description,
                "migration already applied, skipping"
            );
            continue;
        }

        info!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );

        apply_migration(conn, migration)?;
        applied += 1;
    }

    if applied > 0 {
        info!(applied, "migrations complete");
    }

    Ok(applied)
}

/// Return the highest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Migration {
            message: format!("failed to read schema_version: {e}"),
        })?;
    Ok(version)
}

/// Return the latest migration version defined in code.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
           version     INTEGER PRIMARY KEY,
           applied_at  TEXT    NOT NULL,
           description TEXT
         );",
    )
    .map_err(|e| StoreError::Migration {
        message: format!("failed to create schema_version table: {e}"),
    })?;
    Ok(())
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)
        .map_err(|e| StoreError::Migration {
            message: format!("migration v{} failed: {e}", migration.version),
        })?;
    let _ = tx
        .execute(
            "INSERT INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                chrono::Utc::now().to_rfc3339(),
                migration.description
            ],
        )
        .map_err(|e| StoreError::Migration {
            message: format!("failed to record migration v{}: {e}", migration.version),
        })?;
    tx.commit()?;
    Ok(())
}
