//! HTTP route handlers.

pub mod analytics;
pub mod events;
pub mod sites;
