//! Poll interval shared between the tick driver and the workers.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Holds the scheduler's current poll interval.
///
/// Read by the driver before every wait and written by whichever worker
/// first sees the accrual service push back. No clamping is applied.
#[derive(Debug)]
pub struct BackoffController {
    base: Duration,
    current: RwLock<Duration>,
}

impl BackoffController {
    /// Creates a controller starting at `base`.
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: RwLock::new(base),
        }
    }

    /// The interval configured at startup.
    pub fn base_interval(&self) -> Duration {
        self.base
    }

    /// The interval the next wait should use.
    pub fn current_interval(&self) -> Duration {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the interval for the next wait.
    pub fn set_interval(&self, interval: Duration) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = interval;
    }

    /// Restores the base interval.
    pub fn reset(&self) {
        self.set_interval(self.base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_starts_at_base() {
        let backoff = BackoffController::new(Duration::from_secs(10));
        assert_eq!(backoff.current_interval(), Duration::from_secs(10));
        assert_eq!(backoff.base_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_set_and_reset() {
        let backoff = BackoffController::new(Duration::from_secs(10));

        backoff.set_interval(Duration::from_secs(30));
        assert_eq!(backoff.current_interval(), Duration::from_secs(30));
        assert_eq!(backoff.base_interval(), Duration::from_secs(10));

        backoff.reset();
        assert_eq!(backoff.current_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_unclamped() {
        let backoff = BackoffController::new(Duration::from_secs(10));
        backoff.set_interval(Duration::ZERO);
        assert_eq!(backoff.current_interval(), Duration::ZERO);

        backoff.set_interval(Duration::from_secs(86_400));
        assert_eq!(backoff.current_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_concurrent_writers_leave_a_written_value() {
        let backoff = Arc::new(BackoffController::new(Duration::from_secs(10)));
        let handles: Vec<_> = (1..=8u64)
            .map(|i| {
                let backoff = Arc::clone(&backoff);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        backoff.set_interval(Duration::from_secs(i));
                        let seen = backoff.current_interval().as_secs();
                        assert!((1..=8).contains(&seen));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let last = backoff.current_interval().as_secs();
        assert!((1..=8).contains(&last));
    }
}
