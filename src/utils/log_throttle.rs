//! Rate limiting for repetitive warnings such as failing dashboard queries or
//! lagging event subscribers.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    suppressed: u64,
}

/// Per-key emission windows. At most one log per key is let through per window;
/// the rest are counted and reported with the next emitted log.
#[derive(Debug, Default)]
pub struct LogThrottle {
    windows: Mutex<HashMap<String, Window>>,
}

impl LogThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(suppressed)` when a log for `key` may be written now, `None` otherwise.
    pub fn check(&self, key: &str, window: Duration) -> Option<u64> {
        self.check_at(key, window, Instant::now())
    }

    fn check_at(&self, key: &str, window: Duration, now: Instant) -> Option<u64> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(state) = windows.get_mut(key) else {
            windows.insert(
                key.to_string(),
                Window {
                    opened_at: now,
                    suppressed: 0,
                },
            );
            return Some(0);
        };

        if now.saturating_duration_since(state.opened_at) < window {
            state.suppressed += 1;
            return None;
        }
        state.opened_at = now;
        Some(std::mem::take(&mut state.suppressed))
    }
}

static GLOBAL: OnceLock<LogThrottle> = OnceLock::new();

/// Process-wide [`LogThrottle::check`].
pub fn should_emit(key: &str, window: Duration) -> Option<u64> {
    GLOBAL.get_or_init(LogThrottle::new).check(key, window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_logs_are_counted_into_the_next_window() {
        let throttle = LogThrottle::new();
        let window = Duration::from_secs(60);
        let start = Instant::now();

        assert_eq!(throttle.check_at("dashboard.votes", window, start), Some(0));
        assert_eq!(throttle.check_at("dashboard.votes", window, start), None);
        assert_eq!(
            throttle.check_at("dashboard.votes", window, start + Duration::from_secs(1)),
            None
        );
        assert_eq!(
            throttle.check_at("dashboard.votes", window, start + window),
            Some(2)
        );
        assert_eq!(
            throttle.check_at("dashboard.votes", window, start + window),
            None
        );
    }

    #[test]
    fn keys_are_independent() {
        let throttle = LogThrottle::new();
        let window = Duration::from_secs(60);
        let now = Instant::now();

        assert_eq!(throttle.check_at("dashboard.bookings", window, now), Some(0));
        assert_eq!(throttle.check_at("dashboard.settings", window, now), Some(0));
        assert_eq!(throttle.check_at("dashboard.bookings", window, now), None);
    }

    #[test]
    fn global_throttle_is_shared() {
        let key = "utils.log_throttle.global";
        let window = Duration::from_secs(60);
        assert_eq!(should_emit(key, window), Some(0));
        assert_eq!(should_emit(key, window), None);
    }
}
