//! # Time Source
//!
//! Injectable wall clock so freshness and liveness rules can be tested
//! deterministically.

use crate::entities::UnixMillis;

/// Abstract interface for reading the current time.
///
/// Production uses [`SystemTimeSource`]; tests inject a controllable clock.
pub trait TimeSource: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> UnixMillis;
}

/// Wall clock backed by `std::time::SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> UnixMillis {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        UnixMillis::new(millis)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use controllable::ControllableTimeSource;

#[cfg(any(test, feature = "test-utils"))]
mod controllable {
    use super::TimeSource;
    use crate::entities::UnixMillis;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Thread-safe clock for tests requiring time advancement.
    #[derive(Debug, Default)]
    pub struct ControllableTimeSource {
        millis: AtomicU64,
    }

    impl ControllableTimeSource {
        pub fn new(initial_millis: u64) -> Self {
            Self {
                millis: AtomicU64::new(initial_millis),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, millis: u64) {
            self.millis.fetch_add(millis, Ordering::SeqCst);
        }

        pub fn set(&self, millis: u64) {
            self.millis.store(millis, Ordering::SeqCst);
        }
    }

    impl TimeSource for ControllableTimeSource {
        fn now(&self) -> UnixMillis {
            UnixMillis::new(self.millis.load(Ordering::SeqCst))
        }
    }

    impl TimeSource for std::sync::Arc<ControllableTimeSource> {
        fn now(&self) -> UnixMillis {
            self.as_ref().now()
        }
    }
}
