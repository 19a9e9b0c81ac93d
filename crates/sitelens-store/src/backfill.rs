//! Resumable analytical-store backfill.
//!
//! Runs at startup, per tenant, before the server starts answering reads.
//! If the row counts of both tables already match across stores the tenant
//! is skipped. Otherwise the authoritative tables are streamed in stable
//! `(created_at, id)` order and every row the mirror is missing is copied
//! over. Per-row failures are counted, logged, and do not abort the batch;
//! residual divergence after the run is a warning, not an error.

use tracing::{info, instrument, warn};

use crate::errors::Result;
use crate::registry::TenantStore;
use crate::sqlite::{EventRepo, SessionRepo};

/// Rows fetched per authoritative-store batch.
const BATCH_SIZE: u32 = 1000;

/// Outcome of one tenant's backfill pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    /// Counts already matched; nothing was scanned.
    pub skipped_in_parity: bool,
    pub sessions_migrated: u64,
    pub sessions_skipped: u64,
    pub sessions_failed: u64,
    pub events_migrated: u64,
    pub events_skipped: u64,
    pub events_failed: u64,
}

/// Bring one tenant's analytical store up to parity with its authoritative
/// store.
#[instrument(skip(store), fields(domain = %store.domain()))]
pub fn run(store: &TenantStore) -> Result<BackfillReport> {
    let conn = store.pool().get()?;

    let session_count = SessionRepo::count(&conn)?;
    let event_count = EventRepo::count(&conn)?;
    let mirrored_sessions = store.analytic().session_count()?;
    let mirrored_events = store.analytic().event_count()?;

    if session_count == mirrored_sessions && event_count == mirrored_events {
        info!(session_count, event_count, "stores in parity, backfill skipped");
        return Ok(BackfillReport {
            skipped_in_parity: true,
            ..BackfillReport::default()
        });
    }

    info!(
        session_count,
        mirrored_sessions, event_count, mirrored_events, "backfill starting"
    );

    let mut report = BackfillReport::default();

    // Pre-load the mirror's key sets once instead of probing per row.
    let known_sessions = store.analytic().session_ids()?;
    let mut after: Option<(String, String)> = None;
    loop {
        let batch = SessionRepo::list_batch(
            &conn,
            after.as_ref().map(|(c, i)| (c.as_str(), i.as_str())),
            BATCH_SIZE,
        )?;
        let Some(last) = batch.last() else { break };
        after = Some((last.created_at.clone(), last.id.clone()));

        for session in &batch {
            if known_sessions.contains(&session.id) {
                report.sessions_skipped += 1;
                continue;
            }
            match store.analytic().upsert_session(session) {
                Ok(()) => report.sessions_migrated += 1,
                Err(e) => {
                    report.sessions_failed += 1;
                    metrics::counter!("sitelens_backfill_row_failures_total").increment(1);
                    warn!(session_id = %session.id, error = %e, "session backfill row failed");
                }
            }
        }
    }

    let known_events = store.analytic().event_ids()?;
    let mut after: Option<(String, String)> = None;
    loop {
        let batch = EventRepo::list_batch(
            &conn,
            after.as_ref().map(|(c, i)| (c.as_str(), i.as_str())),
            BATCH_SIZE,
        )?;
        let Some(last) = batch.last() else { break };
        after = Some((last.created_at.clone(), last.id.clone()));

        for event in &batch {
            if known_events.contains(&event.id) {
                report.events_skipped += 1;
                continue;
            }
            match store.analytic().insert_event(event) {
                Ok(()) => report.events_migrated += 1,
                Err(e) => {
                    report.events_failed += 1;
                    metrics::counter!("sitelens_backfill_row_failures_total").increment(1);
                    warn!(event_id = %event.id, error = %e, "event backfill row failed");
                }
            }
        }
    }

    info!(
        sessions_migrated = report.sessions_migrated,
        sessions_skipped = report.sessions_skipped,
        sessions_failed = report.sessions_failed,
        events_migrated = report.events_migrated,
        events_skipped = report.events_skipped,
        events_failed = report.events_failed,
        "backfill complete"
    );

    // Residual divergence is tolerated: the next startup retries.
    let final_sessions = store.analytic().session_count()?;
    let final_events = store.analytic().event_count()?;
    if final_sessions != session_count || final_events != event_count {
        warn!(
            session_count,
            final_sessions, event_count, final_events, "stores still diverge after backfill"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row_types::{EventRow, SessionRow};

    fn session(id: &str, start: i64) -> SessionRow {
        SessionRow {
            id: id.to_string(),
            created_at: format!("2024-05-15T12:00:{:02}Z", start % 60),
            updated_at: "2024-05-15T12:00:00Z".to_string(),
            user_ident: format!("ident-{id}"),
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
            session_start: start,
            session_end: start,
            screen_width: 0,
            events: 1,
        }
    }

    fn event(id: &str, session_id: &str) -> EventRow {
        EventRow {
            id: id.to_string(),
            created_at: "2024-05-15T12:00:00Z".to_string(),
            updated_at: "2024-05-15T12:00:00Z".to_string(),
            name: "pageview".to_string(),
            page: "example.com/a".to_string(),
            event_time: 1_700_000_000,
            session_id: session_id.to_string(),
        }
    }

    #[test]
    fn parity_skips_the_scan() {
        let store = TenantStore::open_in_memory("example.com").unwrap();
        let report = run(&store).unwrap();
        assert!(report.skipped_in_parity);
    }

    #[test]
    fn missing_rows_are_copied_over() {
        let store = TenantStore::open_in_memory("example.com").unwrap();
        // Seed inside a scope: `run` needs the pool's only connection.
        {
            let conn = store.pool().get().unwrap();
            for i in 0..3 {
                let _ = SessionRepo::insert(&conn, &session(&format!("s{i}"), 1_700_000_000 + i))
                    .unwrap();
                let _ =
                    EventRepo::insert(&conn, &event(&format!("e{i}"), &format!("s{i}"))).unwrap();
            }
        }

        let report = run(&store).unwrap();
        assert!(!report.skipped_in_parity);
        assert_eq!(report.sessions_migrated, 3);
        assert_eq!(report.events_migrated, 3);
        assert_eq!(store.analytic().session_count().unwrap(), 3);
        assert_eq!(store.analytic().event_count().unwrap(), 3);
    }

    #[test]
    fn already_mirrored_rows_are_skipped() {
        let store = TenantStore::open_in_memory("example.com").unwrap();
        let s0 = session("s0", 1_700_000_000);
        {
            let conn = store.pool().get().unwrap();
            let _ = SessionRepo::insert(&conn, &s0).unwrap();
            let _ = SessionRepo::insert(&conn, &session("s1", 1_700_000_001)).unwrap();
        }
        store.analytic().upsert_session(&s0).unwrap();

        let report = run(&store).unwrap();
        assert_eq!(report.sessions_skipped, 1);
        assert_eq!(report.sessions_migrated, 1);
        assert_eq!(store.analytic().session_count().unwrap(), 2);
    }
}
