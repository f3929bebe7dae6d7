//! Background delivery worker for one endpoint.
//!
//! The worker waits on the client's [`RequestQueue`], folds up to
//! `batch_size` queued requests into one publish call, and resolves every
//! folded request with the same [`BatchResult`]. It exits after publishing the
//! requests drained ahead of a stop sentinel.

use crate::queue::{PublishRequest, RequestQueue};
use crate::transport::SharedTransport;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of an endpoint worker. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    NotStarted = 0,
    Running = 1,
    Stopped = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::NotStarted,
            1 => WorkerState::Running,
            _ => WorkerState::Stopped,
        }
    }
}

/// Atomic holder for a [`WorkerState`].
#[derive(Debug)]
pub(crate) struct AtomicWorkerState(AtomicU8);

impl AtomicWorkerState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(WorkerState::NotStarted as u8))
    }

    pub(crate) fn load(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move from `current` to `new`; returns false if the state was not `current`.
    pub(crate) fn transition(&self, current: WorkerState, new: WorkerState) -> bool {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Outcome shared by every request folded into one publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub success: bool,
    pub message: String,
}

impl BatchResult {
    fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

/// Worker loop. Returns once a stop sentinel has been drained.
pub(crate) async fn run(
    endpoint: String,
    queue: Arc<RequestQueue>,
    transport: SharedTransport,
    batch_size: usize,
) {
    let batch_size = batch_size.max(1);
    info!(endpoint = %endpoint, batch_size, "Publish worker started");

    loop {
        let drained = queue.next_batch(batch_size).await;

        if !drained.requests.is_empty() {
            publish_batch(&endpoint, &transport, drained.requests).await;
        }

        if drained.stop {
            break;
        }
    }

    info!(endpoint = %endpoint, "Publish worker stopped");
}

/// Send one batch and resolve each request's callback with the shared result.
async fn publish_batch(endpoint: &str, transport: &SharedTransport, requests: Vec<PublishRequest>) {
    let batch_id = Uuid::new_v4();

    // Uri and auth come from the first request; all requests in a queue
    // target the same endpoint.
    let (uri, auth_header) = match requests.first() {
        Some(first) => (first.uri.clone(), first.auth_header.clone()),
        None => return,
    };

    let items: Vec<_> = requests
        .iter()
        .flat_map(|request| request.items.iter().cloned())
        .collect();

    debug!(
        endpoint = %endpoint,
        batch_id = %batch_id,
        requests = requests.len(),
        items = items.len(),
        "Publishing batch"
    );

    let result = match transport.publish(&uri, auth_header.as_deref(), &items).await {
        Ok(()) => {
            debug!(endpoint = %endpoint, batch_id = %batch_id, "Batch published");
            BatchResult::ok()
        }
        Err(e) => {
            warn!(
                endpoint = %endpoint,
                batch_id = %batch_id,
                requests = requests.len(),
                error = %e,
                "Batch publish failed"
            );
            BatchResult::failed(e.to_string())
        }
    };

    for request in requests {
        match request.callback {
            Some(callback) => {
                let (success, message) = (result.success, result.message.clone());
                // A panicking callback must not take the worker down with it.
                let outcome = panic::catch_unwind(AssertUnwindSafe(move || callback(success, message)));
                if outcome.is_err() {
                    warn!(endpoint = %endpoint, batch_id = %batch_id, "Publish callback panicked");
                }
            }
            None if !result.success => {
                debug!(batch_id = %batch_id, "Dropping failure for request without callback");
            }
            None => {}
        }
    }
}
