//! FIFO request queue feeding an endpoint worker.

use crate::callback::PublishCallback;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::Notify;
use tracing::debug;

/// One asynchronous publish request.
///
/// `items` already holds one export per target channel.
pub struct PublishRequest {
    /// Base URI of the target endpoint.
    pub uri: String,
    /// `Authorization` value computed when the request was queued.
    pub auth_header: Option<String>,
    /// Exported items, channel already merged in.
    pub items: Vec<Value>,
    /// Receives the outcome of the batch this request is sent in.
    pub callback: Option<PublishCallback>,
}

impl fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishRequest")
            .field("uri", &self.uri)
            .field("items", &self.items.len())
            .field("has_auth", &self.auth_header.is_some())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// An entry in the request queue.
#[derive(Debug)]
pub enum QueueEntry {
    /// A request to deliver.
    Publish(PublishRequest),
    /// Shutdown sentinel.
    Stop,
}

/// Requests drained together in one worker iteration.
#[derive(Debug, Default)]
pub struct Drained {
    /// Publish requests in queue order.
    pub requests: Vec<PublishRequest>,
    /// A stop sentinel ended this drain.
    pub stop: bool,
}

/// Queue shared between publishers and one worker.
#[derive(Default)]
pub struct RequestQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    notify: Notify,
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and wake the worker.
    pub fn push(&self, entry: QueueEntry) {
        let len = {
            let mut entries = self.entries.lock();
            entries.push_back(entry);
            entries.len()
        };
        self.notify.notify_one();
        debug!(pending = len, "Enqueued request");
    }

    /// Take up to `max` publish requests without waiting.
    ///
    /// Draining halts at a stop sentinel; entries behind it stay queued.
    pub fn drain_batch(&self, max: usize) -> Drained {
        let mut drained = Drained::default();
        let mut entries = self.entries.lock();
        while drained.requests.len() < max {
            match entries.pop_front() {
                Some(QueueEntry::Publish(request)) => drained.requests.push(request),
                Some(QueueEntry::Stop) => {
                    drained.stop = true;
                    break;
                }
                None => break,
            }
        }
        drained
    }

    /// Wait until the queue is non-empty, then drain one batch.
    pub async fn next_batch(&self, max: usize) -> Drained {
        loop {
            let drained = self.drain_batch(max);
            if drained.stop || !drained.requests.is_empty() {
                return drained;
            }
            // A push between the drain and this await leaves a stored permit,
            // so the wakeup is not lost.
            self.notify.notified().await;
        }
    }

    /// Number of queued entries, sentinel included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
