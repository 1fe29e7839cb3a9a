//! Sliding-window rate limiter for polite crawling.
//!
//! Two rules enforced under one mutex: at most `requests_per_minute`
//! acquisitions in any window, and a minimum gap of `window / rpm`
//! between consecutive acquisitions even under bursts. `acquire()` is the
//! single serialization point for outbound traffic; holding the lock
//! across the sleeps is what makes the invariants hold at any
//! concurrency level.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct Window {
    timestamps: VecDeque<Instant>,
    last_request: Option<Instant>,
}

/// Sliding-window limiter parameterized by requests per window.
pub struct RateLimiter {
    requests_per_window: usize,
    window: Duration,
    min_gap: Duration,
    inner: Mutex<Window>,
}

impl RateLimiter {
    /// Limiter over the standard 60-second window.
    #[must_use]
    pub fn new(requests_per_minute: usize) -> Self {
        Self::with_window(requests_per_minute, Duration::from_secs(60))
    }

    /// Limiter over an explicit window length (tests use short windows).
    #[must_use]
    pub fn with_window(requests_per_window: usize, window: Duration) -> Self {
        let requests_per_window = requests_per_window.max(1);
        Self {
            requests_per_window,
            window,
            min_gap: window / u32::try_from(requests_per_window).unwrap_or(u32::MAX),
            inner: Mutex::new(Window {
                timestamps: VecDeque::with_capacity(requests_per_window),
                last_request: None,
            }),
        }
    }

    /// Block until another request is safe to issue.
    pub async fn acquire(&self) {
        let mut window = self.inner.lock().await;
        loop {
            let now = Instant::now();

            // Drop acquisitions that fell out of the window.
            while window
                .timestamps
                .front()
                .is_some_and(|t| now.duration_since(*t) > self.window)
            {
                window.timestamps.pop_front();
            }

            // Window full: wait for the oldest entry to expire.
            if window.timestamps.len() >= self.requests_per_window {
                if let Some(oldest) = window.timestamps.front() {
                    let wait = self.window.saturating_sub(now.duration_since(*oldest));
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                }
                continue;
            }

            // Burst smoothing: minimum gap between consecutive requests.
            if let Some(last) = window.last_request {
                let since_last = now.duration_since(last);
                if since_last < self.min_gap {
                    tokio::time::sleep(self.min_gap - since_last).await;
                    continue;
                }
            }

            let stamp = Instant::now();
            window.last_request = Some(stamp);
            window.timestamps.push_back(stamp);
            return;
        }
    }

    /// Requests allowed per window.
    #[must_use]
    pub fn requests_per_window(&self) -> usize {
        self.requests_per_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquires_never_exceed_the_window_budget() {
        // 10 permits per 200 ms window, hammered by 8 workers.
        let limiter = Arc::new(RateLimiter::with_window(10, Duration::from_millis(200)));
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let deadline = Instant::now() + Duration::from_millis(700);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let stamps = Arc::clone(&stamps);
            handles.push(tokio::spawn(async move {
                while Instant::now() < deadline {
                    limiter.acquire().await;
                    stamps.lock().await.push(Instant::now());
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let mut stamps = stamps.lock().await.clone();
        stamps.sort();
        assert!(!stamps.is_empty());
        // Sliding-window invariant: for every acquisition, at most 10
        // acquisitions land in the 200 ms starting at it. A small
        // tolerance absorbs timer wakeup jitter.
        for (i, start) in stamps.iter().enumerate() {
            let in_window = stamps[i..]
                .iter()
                .take_while(|t| t.duration_since(*start) < Duration::from_millis(200))
                .count();
            assert!(
                in_window <= 11,
                "{in_window} acquisitions inside one window"
            );
        }
    }

    #[tokio::test]
    async fn minimum_gap_is_enforced_between_consecutive_acquires() {
        let limiter = RateLimiter::with_window(10, Duration::from_millis(500));
        let mut stamps = Vec::new();
        for _ in 0..4 {
            limiter.acquire().await;
            stamps.push(Instant::now());
        }
        for pair in stamps.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            // min gap is 50 ms; allow scheduling slop downward.
            assert!(gap >= Duration::from_millis(45), "gap was {gap:?}");
        }
    }

    #[tokio::test]
    async fn first_acquire_is_immediate() {
        let limiter = RateLimiter::new(60);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
