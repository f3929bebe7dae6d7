//! Completion callbacks and the N-of-N callback join.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Callback receiving `(success, error_message)` once a request is resolved.
///
/// The message is empty on success.
pub type PublishCallback = Box<dyn FnOnce(bool, String) + Send + 'static>;

struct JoinState {
    remaining: usize,
    success: bool,
    first_error: Option<String>,
    final_callback: Option<PublishCallback>,
}

/// Combines `n` independent results into one final callback.
///
/// The first failure wins: its message is what the final callback sees, and
/// later successes never clear it. The final callback runs exactly once, on
/// whichever thread delivers the last report.
///
/// A join created with `n == 0` never fires; callers with nothing to wait on
/// should invoke their callback directly.
pub struct CallbackJoin {
    state: Mutex<JoinState>,
}

impl CallbackJoin {
    pub fn new(n: usize, final_callback: PublishCallback) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(JoinState {
                remaining: n,
                success: true,
                first_error: None,
                final_callback: Some(final_callback),
            }),
        })
    }

    /// Record one result.
    pub fn report(&self, success: bool, message: String) {
        let fire = {
            let mut state = self.state.lock();

            if state.remaining == 0 {
                debug!(success, "Report after join completed, ignoring");
                return;
            }

            if !success {
                if state.first_error.is_none() {
                    state.success = false;
                    state.first_error = Some(message);
                } else {
                    warn!(error = %message, "Additional publish failure in join");
                }
            }

            state.remaining -= 1;
            if state.remaining > 0 {
                return;
            }
            let success = state.success;
            let message = state.first_error.clone().unwrap_or_default();
            state.final_callback.take().map(|cb| (cb, success, message))
        };

        if let Some((callback, success, message)) = fire {
            callback(success, message);
        }
    }

    /// Results still outstanding.
    pub fn remaining(&self) -> usize {
        self.state.lock().remaining
    }

    /// Wrap [`report`](Self::report) as a per-request callback.
    pub fn handler(self: &Arc<Self>) -> PublishCallback {
        let join = Arc::clone(self);
        Box::new(move |success, message| join.report(success, message))
    }
}

impl fmt::Debug for CallbackJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CallbackJoin")
            .field("remaining", &state.remaining)
            .field("success", &state.success)
            .field("first_error", &state.first_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    type Calls = Arc<Mutex<Vec<(bool, String)>>>;

    fn recorder() -> (Calls, PublishCallback) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let cb: PublishCallback = Box::new(move |ok, msg| sink.lock().push((ok, msg)));
        (calls, cb)
    }

    #[test]
    fn test_all_success() {
        let (calls, cb) = recorder();
        let join = CallbackJoin::new(2, cb);

        join.report(true, String::new());
        assert!(calls.lock().is_empty());
        join.report(true, String::new());

        assert_eq!(*calls.lock(), vec![(true, String::new())]);
    }

    #[test]
    fn test_first_error_wins_in_every_order() {
        let orders: [[(bool, &str); 3]; 3] = [
            [(false, "boom"), (true, ""), (true, "")],
            [(true, ""), (false, "boom"), (true, "")],
            [(true, ""), (true, ""), (false, "boom")],
        ];

        for order in orders {
            let (calls, cb) = recorder();
            let join = CallbackJoin::new(3, cb);
            for (ok, msg) in order {
                join.report(ok, msg.to_string());
            }
            assert_eq!(*calls.lock(), vec![(false, "boom".to_string())]);
        }
    }

    #[test]
    fn test_later_errors_do_not_overwrite_first() {
        let (calls, cb) = recorder();
        let join = CallbackJoin::new(3, cb);

        join.report(false, "first".to_string());
        join.report(false, "second".to_string());
        join.report(true, String::new());

        assert_eq!(*calls.lock(), vec![(false, "first".to_string())]);
    }

    #[test]
    fn test_zero_never_fires() {
        let (calls, cb) = recorder();
        let join = CallbackJoin::new(0, cb);
        join.report(true, String::new());
        assert!(calls.lock().is_empty());
        assert_eq!(join.remaining(), 0);
    }

    #[test]
    fn test_extra_reports_are_ignored() {
        let (calls, cb) = recorder();
        let join = CallbackJoin::new(1, cb);
        join.report(true, String::new());
        join.report(false, "late".to_string());
        assert_eq!(*calls.lock(), vec![(true, String::new())]);
    }

    #[test]
    fn test_concurrent_reports_fire_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let join = CallbackJoin::new(
            64,
            Box::new(move |ok, msg| {
                assert!(!ok);
                assert_eq!(msg, "boom");
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let handler = join.handler();
                thread::spawn(move || {
                    if i == 17 {
                        handler(false, "boom".to_string());
                    } else {
                        handler(true, String::new());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(join.remaining(), 0);
    }
}
