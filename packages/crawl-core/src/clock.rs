//! Injectable time source: the orchestrator must not call
//! `Utc::now()` directly so ETA and scheduling logic stay testable.
//!
//! Shaped like the `Base*` traits in this workspace's `kernel::traits`:
//! a thin `Send + Sync` trait with one production implementation and
//! one deterministic test double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the current task. A real clock sleeps; a test clock can
    /// advance its own notion of `now()` instantly instead of blocking.
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;
    use std::sync::Mutex;

    /// A clock whose `now()` is fixed until explicitly advanced, and
    /// whose `sleep()` advances it rather than blocking. Lets
    /// orchestrator tests assert ETA/backoff math without wall-clock
    /// delay.
    pub struct FixedClock {
        current: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        pub fn at(start: DateTime<Utc>) -> Self {
            Self {
                current: Mutex::new(start),
            }
        }

        pub fn advance(&self, duration: Duration) {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            *current += chrono::Duration::from_std(duration).unwrap_or_default();
        }
    }

    #[async_trait]
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.current.lock().unwrap_or_else(|e| e.into_inner())
        }

        async fn sleep(&self, duration: Duration) {
            self.advance(duration);
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn fixed_clock_advances_on_sleep() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let clock = FixedClock::at(Utc::now());
            let before = clock.now();
            clock.sleep(Duration::from_secs(60)).await;
            let after = clock.now();
            assert_eq!((after - before).num_seconds(), 60);
        });
    }
}
