//! Dual-store write path.
//!
//! Ordering contract: the authoritative `SQLite` transaction commits first;
//! only then is the same state mirrored to the analytical store. A `SQLite`
//! failure propagates — the queue item stays pending and is redelivered. An
//! analytical failure is logged, counted, and swallowed: the mirror is
//! allowed to lag and the startup backfill repairs it.

use tracing::{instrument, warn};

use crate::errors::Result;
use crate::registry::TenantStore;
use crate::row_types::{EventRow, SessionRow};
use crate::sqlite::{EventRepo, SessionRepo};

/// Persist one sessionized event: the session row (created if absent), the
/// event row, and the session's extension for this event, atomically in the
/// authoritative store, then mirrored best-effort.
///
/// Idempotent under queue redelivery: both inserts are keyed on
/// deterministic ids, and the session only extends when the event row was
/// actually new.
#[instrument(skip_all, fields(domain = %store.domain(), event_id = %event.id))]
pub fn write_event(store: &TenantStore, session: &SessionRow, event: &EventRow) -> Result<()> {
    let conn = store.pool().get()?;
    let tx = conn.unchecked_transaction()?;

    let _ = SessionRepo::insert(&tx, session)?;
    let event_was_new = EventRepo::insert(&tx, event)?;
    if event_was_new {
        SessionRepo::extend(&tx, &session.id, event.event_time, &event.updated_at)?;
    }
    tx.commit()?;

    // Mirror the post-commit session state, not the caller's snapshot —
    // the extension above moved session_end and the event counter.
    let mirror = || -> Result<()> {
        if let Some(current) = SessionRepo::get(&conn, &session.id)? {
            store.analytic().upsert_session(&current)?;
        }
        store.analytic().insert_event(event)?;
        Ok(())
    };
    if let Err(e) = mirror() {
        metrics::counter!("sitelens_analytic_write_failures_total").increment(1);
        warn!(error = %e, "analytical mirror write failed, store will lag until backfill");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TenantStore;

    fn sample_session() -> SessionRow {
        SessionRow {
            id: "s1".to_string(),
            created_at: "2024-05-15T12:00:00Z".to_string(),
            updated_at: "2024-05-15T12:00:00Z".to_string(),
            user_ident: "ident-1".to_string(),
            browser: "Firefox".to_string(),
            browser_major: "121".to_string(),
            browser_minor: String::new(),
            browser_patch: String::new(),
            os: "Linux".to_string(),
            os_major: String::new(),
            os_minor: String::new(),
            os_patch: String::new(),
            country: "DE".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            referrer: "(none)".to_string(),
            referrer_full_path: String::new(),
            session_start: 1_700_000_000,
            session_end: 1_700_000_000,
            screen_width: 1920,
            events: 0,
        }
    }

    fn sample_event(id: &str, time: i64) -> EventRow {
        EventRow {
            id: id.to_string(),
            created_at: "2024-05-15T12:00:00Z".to_string(),
            updated_at: "2024-05-15T12:00:00Z".to_string(),
            name: "pageview".to_string(),
            page: "example.com/a".to_string(),
            event_time: time,
            session_id: "s1".to_string(),
        }
    }

    #[test]
    fn write_lands_in_both_stores() {
        let store = TenantStore::open_in_memory("example.com").unwrap();
        write_event(&store, &sample_session(), &sample_event("e1", 1_700_000_000)).unwrap();

        let conn = store.pool().get().unwrap();
        let session = SessionRepo::get(&conn, "s1").unwrap().unwrap();
        assert_eq!(session.events, 1);

        assert_eq!(store.analytic().session_count().unwrap(), 1);
        assert_eq!(store.analytic().event_count().unwrap(), 1);
    }

    #[test]
    fn redelivery_does_not_double_count() {
        let store = TenantStore::open_in_memory("example.com").unwrap();
        let session = sample_session();
        let event = sample_event("e1", 1_700_000_000);
        write_event(&store, &session, &event).unwrap();
        write_event(&store, &session, &event).unwrap();

        let conn = store.pool().get().unwrap();
        let current = SessionRepo::get(&conn, "s1").unwrap().unwrap();
        assert_eq!(current.events, 1);
        assert_eq!(store.analytic().event_count().unwrap(), 1);
    }

    #[test]
    fn later_events_extend_the_session() {
        let store = TenantStore::open_in_memory("example.com").unwrap();
        let session = sample_session();
        write_event(&store, &session, &sample_event("e1", 1_700_000_000)).unwrap();
        write_event(&store, &session, &sample_event("e2", 1_700_000_900)).unwrap();

        let conn = store.pool().get().unwrap();
        let current = SessionRepo::get(&conn, "s1").unwrap().unwrap();
        assert_eq!(current.events, 2);
        assert_eq!(current.session_end, 1_700_000_900);
    }
}
