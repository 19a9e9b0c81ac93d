//! Turns queued raw events into session and event rows.
//!
//! One queue item either attaches to the visitor's open session (last
//! activity within the 30-minute window) or starts a new one. Crawler
//! traffic is dropped before any row is written. All ids are deterministic,
//! so reprocessing a redelivered item converges on the same rows.

use chrono::SecondsFormat;
use tracing::{debug, instrument};

use sitelens_core::crawler::is_crawler;
use sitelens_core::geo::{GeoResolver, NullGeoResolver};
use sitelens_core::identity::{identity_hash, session_id};
use sitelens_core::referrer::{filter_referrer, normalize_page};
use sitelens_core::ua::{RegexUaParser, UserAgentParser};
use sitelens_core::QueuedEvent;
use sitelens_store::{write_event, EventRow, SessionRow, StoreError, TenantStore};
use sitelens_store::sqlite::SessionRepo;

use crate::errors::Result;

/// Inactivity window: a session stays open while consecutive events are at
/// most this many seconds apart.
pub const SESSION_WINDOW_SECS: i64 = 30 * 60;

/// What became of one queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Rows were written (or already existed, under redelivery).
    Stored,
    /// The user agent matched a crawler signature; nothing was written.
    DroppedCrawler,
}

/// Sessionization pipeline. Holds the user-agent parser and geo resolver
/// behind traits so tests can substitute either.
pub struct Sessionizer {
    ua_parser: Box<dyn UserAgentParser>,
    geo: Box<dyn GeoResolver>,
}

impl Default for Sessionizer {
    fn default() -> Self {
        Self::new(Box::new(RegexUaParser), Box::new(NullGeoResolver))
    }
}

impl Sessionizer {
    pub fn new(ua_parser: Box<dyn UserAgentParser>, geo: Box<dyn GeoResolver>) -> Self {
        Self { ua_parser, geo }
    }

    /// Process one queue item against its tenant store.
    ///
    /// Idempotent: the session id hashes the identity plus the session start
    /// time, the event id was minted at enqueue, and the write path ignores
    /// rows that already exist.
    #[instrument(skip_all, fields(domain = %event.domain, event_id = %event.event_id))]
    pub fn process(&self, store: &TenantStore, event: &QueuedEvent) -> Result<Outcome> {
        if is_crawler(&event.user_agent) {
            metrics::counter!("sitelens_crawler_drops_total").increment(1);
            debug!(user_agent = %event.user_agent, "crawler traffic dropped");
            return Ok(Outcome::DroppedCrawler);
        }

        let user_ident = identity_hash(
            &event.user_agent,
            &event.domain,
            &event.host_name,
            &event.ip,
        )
        .to_string();
        let event_time = event.time.timestamp();
        let cutoff = event_time - SESSION_WINDOW_SECS;

        // The pooled connection is released before the write below takes
        // its own.
        let open = {
            let conn = store.pool().get().map_err(StoreError::from)?;
            SessionRepo::find_open(&conn, &user_ident, cutoff)?
        };

        let now = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let session = match open {
            Some(existing) => existing,
            None => self.new_session(event, &user_ident, event_time, &now),
        };

        let event_row = EventRow {
            id: event.event_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
            name: event.name.clone(),
            page: normalize_page(&event.domain, &event.page),
            event_time,
            session_id: session.id.clone(),
        };

        write_event(store, &session, &event_row)?;
        Ok(Outcome::Stored)
    }

    fn new_session(
        &self,
        event: &QueuedEvent,
        user_ident: &str,
        event_time: i64,
        now: &str,
    ) -> SessionRow {
        let ua = self.ua_parser.parse(&event.user_agent);
        let country = self.geo.country(&event.ip);
        let (referrer, referrer_full_path) = filter_referrer(&event.referrer, &event.domain);

        SessionRow {
            id: session_id(
                &event.user_agent,
                &event.domain,
                &event.host_name,
                &event.ip,
                event_time,
            )
            .to_string(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
            user_ident: user_ident.to_string(),
            browser: ua.browser,
            browser_major: ua.browser_major,
            browser_minor: ua.browser_minor,
            browser_patch: ua.browser_patch,
            os: ua.os,
            os_major: ua.os_major,
            os_minor: ua.os_minor,
            os_patch: ua.os_patch,
            country,
            user_agent: event.user_agent.clone(),
            referrer,
            referrer_full_path,
            session_start: event_time,
            session_end: event_time,
            screen_width: event.screen_width,
            events: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    const FIREFOX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn queued(page: &str, time: DateTime<Utc>) -> QueuedEvent {
        QueuedEvent {
            event_id: Uuid::now_v7(),
            name: "pageview".to_string(),
            user_agent: FIREFOX.to_string(),
            host_name: "stats.example.com".to_string(),
            domain: "example.com".to_string(),
            page: page.to_string(),
            client_hint_ua: String::new(),
            client_hint_mobile: String::new(),
            client_hint_platform: String::new(),
            client_hint_full_version: String::new(),
            client_hint_platform_version: String::new(),
            ip: "203.0.113.9".to_string(),
            referrer: "https://www.external.com/path".to_string(),
            time,
            screen_width: 1920,
        }
    }

    fn setup() -> (TenantStore, Sessionizer) {
        (
            TenantStore::open_in_memory("example.com").unwrap(),
            Sessionizer::default(),
        )
    }

    #[test]
    fn first_event_creates_a_session() {
        let (store, sessionizer) = setup();
        let outcome = sessionizer
            .process(&store, &queued("/a", base_time()))
            .unwrap();
        assert_eq!(outcome, Outcome::Stored);

        let conn = store.pool().get().unwrap();
        assert_eq!(SessionRepo::count(&conn).unwrap(), 1);

        let batch = SessionRepo::list_batch(&conn, None, 10).unwrap();
        let session = &batch[0];
        assert_eq!(session.browser, "Firefox");
        assert_eq!(session.referrer, "external.com");
        assert_eq!(session.events, 1);
    }

    #[test]
    fn events_within_the_window_share_a_session() {
        let (store, sessionizer) = setup();
        let _ = sessionizer
            .process(&store, &queued("/a", base_time()))
            .unwrap();
        let _ = sessionizer
            .process(&store, &queued("/b", base_time() + Duration::minutes(10)))
            .unwrap();

        let conn = store.pool().get().unwrap();
        assert_eq!(SessionRepo::count(&conn).unwrap(), 1);
        let session = &SessionRepo::list_batch(&conn, None, 10).unwrap()[0];
        assert_eq!(session.events, 2);
        assert_eq!(
            session.session_end - session.session_start,
            10 * 60
        );
    }

    #[test]
    fn inactivity_beyond_the_window_starts_a_new_session() {
        let (store, sessionizer) = setup();
        let _ = sessionizer
            .process(&store, &queued("/a", base_time()))
            .unwrap();
        let _ = sessionizer
            .process(&store, &queued("/b", base_time() + Duration::minutes(31)))
            .unwrap();

        let conn = store.pool().get().unwrap();
        assert_eq!(SessionRepo::count(&conn).unwrap(), 2);
    }

    #[test]
    fn boundary_event_still_attaches() {
        let (store, sessionizer) = setup();
        let _ = sessionizer
            .process(&store, &queued("/a", base_time()))
            .unwrap();
        // Exactly 30 minutes later: session_end == cutoff, still open.
        let _ = sessionizer
            .process(&store, &queued("/b", base_time() + Duration::minutes(30)))
            .unwrap();

        let conn = store.pool().get().unwrap();
        assert_eq!(SessionRepo::count(&conn).unwrap(), 1);
    }

    #[test]
    fn redelivered_item_converges_on_the_same_rows() {
        let (store, sessionizer) = setup();
        let item = queued("/a", base_time());
        let _ = sessionizer.process(&store, &item).unwrap();
        let _ = sessionizer.process(&store, &item).unwrap();

        let conn = store.pool().get().unwrap();
        assert_eq!(SessionRepo::count(&conn).unwrap(), 1);
        let session = &SessionRepo::list_batch(&conn, None, 10).unwrap()[0];
        assert_eq!(session.events, 1);
    }

    #[test]
    fn crawler_traffic_is_dropped() {
        let (store, sessionizer) = setup();
        let mut item = queued("/a", base_time());
        item.user_agent =
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)".to_string();

        let outcome = sessionizer.process(&store, &item).unwrap();
        assert_eq!(outcome, Outcome::DroppedCrawler);

        let conn = store.pool().get().unwrap();
        assert_eq!(SessionRepo::count(&conn).unwrap(), 0);
    }

    #[test]
    fn distinct_visitors_get_distinct_sessions() {
        let (store, sessionizer) = setup();
        let _ = sessionizer
            .process(&store, &queued("/a", base_time()))
            .unwrap();
        let mut other = queued("/a", base_time());
        other.ip = "203.0.113.10".to_string();
        let _ = sessionizer.process(&store, &other).unwrap();

        let conn = store.pool().get().unwrap();
        assert_eq!(SessionRepo::count(&conn).unwrap(), 2);
    }

    #[test]
    fn page_is_normalized_to_domain_plus_path() {
        let (store, sessionizer) = setup();
        let _ = sessionizer
            .process(&store, &queued("https://example.com/docs/intro/", base_time()))
            .unwrap();

        let conn = store.pool().get().unwrap();
        let events = sitelens_store::sqlite::EventRepo::list_batch(&conn, None, 10).unwrap();
        assert_eq!(events[0].page, "example.com/docs/intro");
    }
}
