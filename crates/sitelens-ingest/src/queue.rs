//! Crash-durable disk queue, one serialized item per file.
//!
//! Items are JSON files named by a zero-padded monotonic sequence so
//! lexicographic order is delivery order. `push` fsyncs before signaling, so
//! an acknowledged item survives a crash. The consumer contract is
//! peek, handle, pop: the head is removed only after the handler returns,
//! which makes delivery at-least-once. Handlers must be idempotent.
//!
//! Single consumer. `peek` blocks indefinitely on an empty queue;
//! [`EventQueue::shutdown`] unblocks it so the worker thread can exit.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use parking_lot::{Condvar, Mutex};
use tracing::{info, warn};

use sitelens_core::QueuedEvent;

use crate::errors::Result;

/// Subdirectory for undecodable items, kept for inspection.
const CORRUPT_DIR: &str = "corrupt";

struct QueueState {
    pending: VecDeque<String>,
    next_seq: u64,
    shutdown: bool,
}

/// Durable FIFO queue of [`QueuedEvent`]s backed by a directory.
pub struct EventQueue {
    dir: PathBuf,
    state: Mutex<QueueState>,
    signal: Condvar,
}

impl EventQueue {
    /// Open a queue directory, recovering any items a previous run left
    /// pending. Recovered items are redelivered in their original order.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        fs::create_dir_all(dir.join(CORRUPT_DIR))?;

        let mut pending: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        pending.sort();

        let next_seq = pending
            .last()
            .and_then(|name| name.trim_end_matches(".json").parse::<u64>().ok())
            .map_or(0, |seq| seq + 1);

        if !pending.is_empty() {
            info!(count = pending.len(), ?dir, "recovered pending queue items");
        }

        Ok(Self {
            dir,
            state: Mutex::new(QueueState {
                pending: pending.into(),
                next_seq,
                shutdown: false,
            }),
            signal: Condvar::new(),
        })
    }

    /// Append one item. Durable before return: the item file is fsynced,
    /// then the consumer is signaled. Never blocks on the consumer.
    pub fn push(&self, event: &QueuedEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;

        let mut state = self.state.lock();
        let name = format!("{:020}.json", state.next_seq);
        state.next_seq += 1;

        let path = self.dir.join(&name);
        let mut file = File::create(&path)?;
        file.write_all(&payload)?;
        file.sync_all()?;

        state.pending.push_back(name);
        drop(state);
        let _ = self.signal.notify_one();
        Ok(())
    }

    /// Block until an item is available and return the head without
    /// removing it. Returns `None` once the queue is shut down and drained
    /// of decodable items.
    ///
    /// Corrupt head items are moved aside and skipped, not retried.
    pub fn peek(&self) -> Option<QueuedEvent> {
        let mut state = self.state.lock();
        loop {
            while state.pending.is_empty() {
                if state.shutdown {
                    return None;
                }
                self.signal.wait(&mut state);
            }

            let name = state.pending.front().cloned()?;
            let path = self.dir.join(&name);
            let decoded = fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| {
                    serde_json::from_slice::<QueuedEvent>(&bytes).map_err(|e| e.to_string())
                });
            match decoded {
                Ok(event) => return Some(event),
                Err(error) => {
                    warn!(item = %name, %error, "corrupt queue item, moving aside");
                    metrics::counter!("sitelens_queue_corrupt_items_total").increment(1);
                    let _ = state.pending.pop_front();
                    if let Err(e) = fs::rename(&path, self.dir.join(CORRUPT_DIR).join(&name)) {
                        warn!(item = %name, error = %e, "failed to quarantine corrupt item");
                    }
                }
            }
        }
    }

    /// Remove the head item. Called only after its handler succeeded.
    pub fn pop(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(name) = state.pending.pop_front() {
            fs::remove_file(self.dir.join(name))?;
        }
        Ok(())
    }

    /// Begin shutdown. `peek` keeps delivering items already queued, so the
    /// consumer drains the backlog and exits once `peek` returns `None`.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        drop(state);
        let _ = self.signal.notify_all();
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether the queue has no pending items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample(page: &str) -> QueuedEvent {
        QueuedEvent {
            event_id: Uuid::now_v7(),
            name: "pageview".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            host_name: "stats.example.com".to_string(),
            domain: "example.com".to_string(),
            page: page.to_string(),
            client_hint_ua: String::new(),
            client_hint_mobile: String::new(),
            client_hint_platform: String::new(),
            client_hint_full_version: String::new(),
            client_hint_platform_version: String::new(),
            ip: "203.0.113.9".to_string(),
            referrer: String::new(),
            time: Utc::now(),
            screen_width: 1280,
        }
    }

    #[test]
    fn push_peek_pop_in_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue = EventQueue::open(dir.path()).unwrap();

        queue.push(&sample("/a")).unwrap();
        queue.push(&sample("/b")).unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.peek().unwrap().page, "/a");
        // Peek does not remove.
        assert_eq!(queue.peek().unwrap().page, "/a");
        queue.pop().unwrap();
        assert_eq!(queue.peek().unwrap().page, "/b");
        queue.pop().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn items_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let queue = EventQueue::open(dir.path()).unwrap();
            queue.push(&sample("/persisted")).unwrap();
        }
        let reopened = EventQueue::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.peek().unwrap().page, "/persisted");
    }

    #[test]
    fn sequence_continues_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let queue = EventQueue::open(dir.path()).unwrap();
            queue.push(&sample("/a")).unwrap();
            queue.push(&sample("/b")).unwrap();
            queue.pop().unwrap();
        }
        let reopened = EventQueue::open(dir.path()).unwrap();
        reopened.push(&sample("/c")).unwrap();
        // "/b" first, then "/c": the new item never sorts before a survivor.
        assert_eq!(reopened.peek().unwrap().page, "/b");
        reopened.pop().unwrap();
        assert_eq!(reopened.peek().unwrap().page, "/c");
    }

    #[test]
    fn corrupt_items_are_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let queue = EventQueue::open(dir.path()).unwrap();
        queue.push(&sample("/good")).unwrap();

        // Corrupt the head file on disk.
        let head = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .find(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .unwrap();
        std::fs::write(head.path(), b"{not json").unwrap();
        queue.push(&sample("/next")).unwrap();

        // The corrupt head is skipped; the next decodable item is delivered.
        assert_eq!(queue.peek().unwrap().page, "/next");
        assert!(dir.path().join(CORRUPT_DIR).read_dir().unwrap().count() == 1);
    }

    #[test]
    fn shutdown_delivers_the_backlog_before_ending() {
        let dir = tempfile::tempdir().unwrap();
        let queue = EventQueue::open(dir.path()).unwrap();
        queue.push(&sample("/a")).unwrap();
        queue.push(&sample("/b")).unwrap();

        queue.shutdown();
        assert_eq!(queue.peek().unwrap().page, "/a");
        queue.pop().unwrap();
        assert_eq!(queue.peek().unwrap().page, "/b");
        queue.pop().unwrap();
        assert!(queue.peek().is_none());
    }

    #[test]
    fn shutdown_unblocks_peek() {
        let dir = tempfile::tempdir().unwrap();
        let queue = std::sync::Arc::new(EventQueue::open(dir.path()).unwrap());

        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            std::thread::spawn(move || queue.peek())
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        queue.shutdown();
        assert!(waiter.join().unwrap().is_none());
    }
}
