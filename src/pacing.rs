//! Pacing floor for chunk dispatch.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum wall-clock duration per chunk.
///
/// A zero floor disables pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    floor: Duration,
}

impl Pacer {
    pub fn new(floor: Duration) -> Self {
        Self { floor }
    }

    /// Mark a chunk launch.
    pub fn start(&self) -> PaceGuard {
        PaceGuard {
            started: Instant::now(),
            floor: self.floor,
        }
    }
}

/// Launch instant of one chunk.
#[derive(Debug)]
pub struct PaceGuard {
    started: Instant,
    floor: Duration,
}

impl PaceGuard {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the floor is reached, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let elapsed = self.elapsed();
        if elapsed < self.floor {
            Some(self.floor - elapsed)
        } else {
            None
        }
    }

    /// Sleep until `floor` has elapsed since launch. Returns the time slept.
    pub async fn wait(self) -> Duration {
        match self.remaining() {
            Some(rest) => {
                debug!(
                    floor_ms = millis(self.floor),
                    sleep_ms = millis(rest),
                    "pacing chunk"
                );
                tokio::time::sleep_until(self.started + self.floor).await;
                rest
            }
            None => Duration::ZERO,
        }
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_fills_floor() {
        let pacer = Pacer::new(Duration::from_millis(200));
        let guard = pacer.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let slept = guard.wait().await;
        assert_eq!(slept, Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_when_floor_exceeded() {
        let pacer = Pacer::new(Duration::from_millis(20));
        let guard = pacer.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let before = Instant::now();
        assert_eq!(guard.wait().await, Duration::ZERO);
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(150)), 150);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_sleeps() {
        let pacer = Pacer::new(Duration::ZERO);
        let guard = pacer.start();
        assert!(guard.remaining().is_none());
        assert_eq!(guard.wait().await, Duration::ZERO);
    }
}
