//! # sitelens-core
//!
//! Shared domain types and pure logic for the Sitelens analytics engine:
//! queued-event and filter types, deterministic identity hashing, referrer
//! and page normalization, crawler detection, and time-period resolution.
//!
//! Everything in this crate is side-effect free — no storage, no I/O — so
//! the ingest pipeline and the query layer can share one vocabulary.

pub mod crawler;
pub mod errors;
pub mod filters;
pub mod geo;
pub mod identity;
pub mod period;
pub mod referrer;
pub mod types;
pub mod ua;

pub use errors::{CoreError, Result};
pub use filters::FilterSpec;
pub use types::{EventPayload, QueuedEvent};
