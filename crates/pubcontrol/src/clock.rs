//! Time source used for token expiry.

use std::sync::Arc;

/// Provides the current UTC time as UNIX seconds.
///
/// Injected into clients so JWT expiry is reproducible in tests.
pub trait Clock: Send + Sync {
    fn now_utc_seconds(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_utc_seconds(&self) -> i64 {
        self.0
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;
