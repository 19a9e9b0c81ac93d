//! Wire and queue item types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON body accepted by `POST /api/event`.
///
/// `name` must be `"pageview"`; `domain` and `page` must be non-empty.
/// Validation happens at the HTTP boundary so invalid input is never queued.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub name: String,
    pub domain: String,
    pub page: String,
    #[serde(default)]
    pub screen_width: i64,
}

/// One raw client signal, captured at HTTP ingress and carried through the
/// durable queue to the sessionizer.
///
/// The `event_id` is minted at enqueue time (UUIDv7) so a redelivered item
/// produces the same event row downstream — the event insert is idempotent
/// by primary key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedEvent {
    pub event_id: Uuid,
    pub name: String,
    pub user_agent: String,
    pub host_name: String,
    pub domain: String,
    pub page: String,
    pub client_hint_ua: String,
    pub client_hint_mobile: String,
    pub client_hint_platform: String,
    pub client_hint_full_version: String,
    pub client_hint_platform_version: String,
    pub ip: String,
    pub referrer: String,
    pub time: DateTime<Utc>,
    pub screen_width: i64,
}

impl QueuedEvent {
    /// The only event name the pipeline currently recognizes.
    pub const PAGEVIEW: &'static str = "pageview";
}
