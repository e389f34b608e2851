//! Fixed window rate limiter
//!
//! One counter per protected operation type. The window resets lazily on the
//! first call after expiry; there is no background task.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Window {
    start: Instant,
    count: u32,
}

/// Fixed window counter.
///
/// Uses `tokio::time::Instant` so tests can pause and advance the clock.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(Window {
                start: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Admit one call if the current window has budget left.
    ///
    /// Expired windows reset to `count = 0` before the check, so the first
    /// call of a fresh window always succeeds (given `limit > 0`).
    pub async fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if now >= state.start + self.window {
            state.start = now;
            state.count = 0;
        }

        if state.count >= self.limit {
            return false;
        }

        state.count += 1;
        true
    }

    /// Calls admitted in the current window.
    pub async fn current_count(&self) -> u32 {
        self.state.lock().await.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_limit() {
        let limiter = FixedWindowLimiter::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(limiter.try_acquire().await);
        }
        assert!(!limiter.try_acquire().await);
        assert_eq!(limiter.current_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_resets_the_counter() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_millis(100));

        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);

        tokio::time::advance(Duration::from_millis(101)).await;
        assert!(limiter.try_acquire().await);
        assert_eq!(limiter.current_count().await, 1);
    }
}
