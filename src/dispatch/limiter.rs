//! Reservoir rate limiter: bounded permits per rolling window plus a minimum
//! spacing between consecutive calls.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct LimiterState {
    window_start: Instant,
    used: u32,
    last_release: Option<Instant>,
}

/// Capacity-bounded scheduler for outbound posting calls.
///
/// `acquire` suspends the caller until a slot is free: at most `capacity`
/// releases per window (replenished at the window boundary) and at least
/// `min_spacing` between any two consecutive releases. Waiters hold the
/// internal fair mutex across their sleep, so slots are granted strictly in
/// first-come-first-served order and excess calls are delayed into the next
/// window, never dropped.
#[derive(Debug)]
pub struct ReservoirLimiter {
    capacity: u32,
    window: Duration,
    min_spacing: Duration,
    state: Mutex<LimiterState>,
}

impl ReservoirLimiter {
    pub fn new(capacity: u32, window: Duration, min_spacing: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            min_spacing,
            state: Mutex::new(LimiterState {
                window_start: Instant::now(),
                used: 0,
                last_release: None,
            }),
        }
    }

    /// Wait for and consume one scheduling slot.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        loop {
            let now = Instant::now();

            // Advance the window if the boundary has passed.
            if now.duration_since(state.window_start) >= self.window {
                state.window_start = now;
                state.used = 0;
            }

            if state.used >= self.capacity {
                let boundary = state.window_start + self.window;
                tokio::time::sleep_until(boundary).await;
                continue;
            }

            if let Some(last) = state.last_release {
                let earliest = last + self.min_spacing;
                if now < earliest {
                    tokio::time::sleep_until(earliest).await;
                    // Spacing satisfied; re-check the window before releasing.
                    continue;
                }
            }

            state.used += 1;
            state.last_release = Some(Instant::now());
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_permits_within_window_do_not_wait() {
        let limiter = ReservoirLimiter::new(3, Duration::from_secs(60), Duration::ZERO);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_excess_call_delayed_to_next_window() {
        let limiter = ReservoirLimiter::new(2, Duration::from_secs(60), Duration::ZERO);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(Instant::now().duration_since(start) >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_spacing_enforced_with_permits_remaining() {
        let limiter = ReservoirLimiter::new(10, Duration::from_secs(60), Duration::from_secs(1));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;

        assert!(Instant::now().duration_since(start) >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_never_dropped() {
        let limiter = Arc::new(ReservoirLimiter::new(
            1,
            Duration::from_secs(10),
            Duration::ZERO,
        ));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move {
                l.acquire().await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        // Three acquisitions at one permit per 10s window take two boundaries.
        // Reaching here at all proves nothing was dropped.
    }
}
