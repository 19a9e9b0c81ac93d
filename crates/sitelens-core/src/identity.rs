//! Deterministic pseudonymous identity and surrogate-id hashing.
//!
//! All three hashes are UUIDv5 (namespaced SHA-1) so identical inputs always
//! map to identical ids: the identity hash groups events from one visitor,
//! the session id makes session creation idempotent under queue redelivery,
//! and the storage key names a tenant's database files.

use uuid::Uuid;

/// Namespace for visitor identity hashes.
const IDENTITY_NAMESPACE: Uuid = Uuid::from_bytes(*b"fdff1df9-3a7f-44");

/// Namespace for session surrogate ids.
const SESSION_NAMESPACE: Uuid = Uuid::from_bytes(*b"6ddc50f6-86e9-4d");

/// Namespace for tenant storage keys.
const STORAGE_NAMESPACE: Uuid = Uuid::from_bytes(*b"0d032761-6264-49");

/// Pseudonymous visitor identity: hash of (user agent, domain, host, IP).
///
/// No raw identifier is persisted — only this hash — and the same tuple
/// always yields the same identity.
pub fn identity_hash(user_agent: &str, domain: &str, host: &str, ip: &str) -> Uuid {
    let input = format!("{user_agent}{domain}{host}{ip}");
    Uuid::new_v5(&IDENTITY_NAMESPACE, input.as_bytes())
}

/// Deterministic session id: hash of the identity inputs plus the session
/// start time (Unix seconds).
///
/// Identical identity + start time always produce the same session id, so a
/// redelivered first-event of a session re-creates the same row instead of
/// splitting the visit.
pub fn session_id(
    user_agent: &str,
    domain: &str,
    host: &str,
    ip: &str,
    start_unix: i64,
) -> Uuid {
    let input = format!("{user_agent}{domain}{host}{ip}{start_unix}");
    Uuid::new_v5(&SESSION_NAMESPACE, input.as_bytes())
}

/// Storage key for a tenant domain: names the per-domain database files.
pub fn storage_key(domain: &str) -> Uuid {
    Uuid::new_v5(&STORAGE_NAMESPACE, domain.as_bytes())
}
