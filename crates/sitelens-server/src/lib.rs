//! # sitelens-server
//!
//! Axum HTTP server for the Sitelens analytics engine.
//!
//! - `POST /api/event`: the tracking beacon. Validates, captures client
//!   signals from headers, and enqueues to the durable ingestion queue.
//! - `GET /api/sites`: the configured websites.
//! - `GET /api/{domain}/...`: the analytics query API (summaries plus the
//!   browser, OS, country, referrer, and page aggregates).

#![deny(unsafe_code)]

pub mod errors;
pub mod extract;
pub mod routes;
pub mod server;

pub use errors::{Result, ServerError};
pub use server::{AppState, SitelensServer};
