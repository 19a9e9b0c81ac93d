//! # sitelens-store
//!
//! Dual-store persistence for the Sitelens analytics engine.
//!
//! The authoritative store is `SQLite` (row-oriented, WAL, transactional);
//! the analytical store is `DuckDB` (columnar, optimized for the aggregate
//! scans the dashboard runs). Every write commits to `SQLite` first, then
//! mirrors best-effort; the startup [`backfill`] repairs any lag. Aggregate
//! and summary queries run against the analytical store through the
//! [`query`] compositor.

#![deny(unsafe_code)]

pub mod analytic;
pub mod backfill;
pub mod errors;
pub mod query;
pub mod registry;
pub mod row_types;
pub mod sqlite;
pub mod writer;

pub use analytic::AnalyticStore;
pub use errors::{Result, StoreError};
pub use query::{aggregate, summary, Dimension};
pub use registry::{StoreRegistry, TenantStore};
pub use row_types::{AggregateRow, EventRow, SessionRow, Summary};
pub use writer::write_event;
