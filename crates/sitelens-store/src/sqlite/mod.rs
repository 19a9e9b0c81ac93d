//! `SQLite` backend — the authoritative store.
//!
//! Owns identity and commit order: every session and event is written here
//! first, inside one transaction, before being mirrored to the analytical
//! store.
//!
//! - **[`connection`]**: `r2d2` connection pool with WAL mode, foreign keys,
//!   and performance pragmas applied to every connection.
//! - **[`migrations`]**: Version-tracked schema evolution, run
//!   transactionally and idempotently at store open.
//! - **[`repositories`]**: Stateless repository structs — each method takes
//!   `&Connection` and executes SQL.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{new_file, new_in_memory, ConnectionConfig, ConnectionPool, PooledConnection};
pub use migrations::{current_version, latest_version, run_migrations};
pub use repositories::{EventRepo, SessionRepo};
