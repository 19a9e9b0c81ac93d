//! Raw database row structs shared by both stores.
//!
//! Timestamps that feed range predicates (`session_start`, `session_end`,
//! `event_time`) are Unix seconds so comparisons work identically in `SQLite`
//! and `DuckDB`; audit timestamps (`created_at`, `updated_at`) are RFC 3339
//! strings and never filtered on.

use serde::Serialize;

/// One visit session. Identical shape in both stores; the `SQLite` copy is
/// authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    /// Pseudonymous visitor identity hash.
    pub user_ident: String,
    pub browser: String,
    pub browser_major: String,
    pub browser_minor: String,
    pub browser_patch: String,
    pub os: String,
    pub os_major: String,
    pub os_minor: String,
    pub os_patch: String,
    /// ISO 3166-1 alpha-2 country code, or `unknown`.
    pub country: String,
    pub user_agent: String,
    /// Referrer domain, or the `(none)` sentinel.
    pub referrer: String,
    /// Referrer domain + path, or empty.
    pub referrer_full_path: String,
    /// Unix seconds.
    pub session_start: i64,
    /// Unix seconds; monotonically non-decreasing.
    pub session_end: i64,
    pub screen_width: i64,
    /// Events counted into this session.
    pub events: i64,
}

/// One page-view event, owned by a session. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub name: String,
    /// Canonical page key: `domain/trimmed-path`.
    pub page: String,
    /// Unix seconds.
    pub event_time: i64,
    pub session_id: String,
}

/// One aggregate result row: a dimension value, how many sessions (or
/// events) carry it, and whether a further drill-down level exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow {
    pub value: String,
    pub count: i64,
    /// Count of rows in this group whose next-level field is non-empty and
    /// non-zero. Zero means the drill-down ends here.
    pub drillable: i64,
}

/// Summary metrics over one filtered session set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub sessions: i64,
    pub page_views: i64,
    /// Mean `session_end - session_start` in seconds; 0 when no sessions
    /// match.
    pub avg_session_duration: f64,
    /// Percentage of zero-duration sessions, rounded to the nearest integer;
    /// 0 when no sessions match.
    pub bounce_rate: i64,
}
