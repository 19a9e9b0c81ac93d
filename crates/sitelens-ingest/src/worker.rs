//! Single consumer thread draining the durable queue.
//!
//! One item at a time: peek, resolve the tenant store, sessionize, pop.
//! A handler failure leaves the item at the head of the queue and backs off
//! before retrying, so a transient store error never loses an event. Items
//! for domains not present in the settings are popped and counted — they
//! would never succeed.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{info, warn};

use sitelens_core::QueuedEvent;
use sitelens_store::{StoreError, StoreRegistry};

use crate::errors::{IngestError, Result};
use crate::queue::EventQueue;
use crate::sessionizer::Sessionizer;

/// Pause after a failed item before redelivering it.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Queue consumer. Owns the sessionizer; shares the queue and registry.
pub struct Worker {
    queue: Arc<EventQueue>,
    registry: Arc<StoreRegistry>,
    sessionizer: Sessionizer,
}

impl Worker {
    pub fn new(
        queue: Arc<EventQueue>,
        registry: Arc<StoreRegistry>,
        sessionizer: Sessionizer,
    ) -> Self {
        Self {
            queue,
            registry,
            sessionizer,
        }
    }

    /// Consume until the queue shuts down. Runs on the spawned thread.
    fn run(self) {
        info!("event worker started");
        while let Some(event) = self.queue.peek() {
            match self.handle(&event) {
                Ok(()) => {
                    if let Err(e) = self.queue.pop() {
                        warn!(error = %e, "failed to remove completed queue item");
                    }
                }
                Err(IngestError::Store(StoreError::UnknownDomain(domain))) => {
                    // Not retryable: the tenant does not exist.
                    metrics::counter!("sitelens_unknown_domain_drops_total").increment(1);
                    warn!(%domain, "dropping event for unknown domain");
                    if let Err(e) = self.queue.pop() {
                        warn!(error = %e, "failed to remove dropped queue item");
                    }
                }
                Err(e) => {
                    metrics::counter!("sitelens_event_handler_failures_total").increment(1);
                    warn!(error = %e, "event handling failed, item stays queued");
                    std::thread::sleep(RETRY_BACKOFF);
                }
            }
        }
        info!("event worker stopped");
    }

    fn handle(&self, event: &QueuedEvent) -> Result<()> {
        // The HTTP boundary rejects unknown domains before enqueueing, but
        // items recovered from disk may predate a settings change.
        if sitelens_settings::get_settings()
            .website(&event.domain)
            .is_none()
        {
            return Err(StoreError::UnknownDomain(event.domain.clone()).into());
        }
        let store = self.registry.get_or_open(&event.domain)?;
        let _ = self.sessionizer.process(&store, event)?;
        Ok(())
    }

    /// Spawn the consumer thread. Join the handle after
    /// [`EventQueue::shutdown`] to drain cleanly.
    pub fn spawn(self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("sitelens-event-worker".to_string())
            .spawn(move || self.run())
            .unwrap_or_else(|e| panic!("failed to spawn event worker thread: {e}"))
    }
}
