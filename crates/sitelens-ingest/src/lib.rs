//! # sitelens-ingest
//!
//! Ingestion pipeline for the Sitelens analytics engine: a crash-durable
//! disk queue decouples the HTTP boundary from persistence, and a single
//! worker thread drains it through the sessionizer into the per-tenant
//! stores. Delivery is at-least-once; every downstream write is idempotent.

#![deny(unsafe_code)]

pub mod errors;
pub mod queue;
pub mod sessionizer;
pub mod worker;

pub use errors::{IngestError, Result};
pub use queue::EventQueue;
pub use sessionizer::{Outcome, Sessionizer, SESSION_WINDOW_SECS};
pub use worker::Worker;
