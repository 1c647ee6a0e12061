//! Rate limiter: target inter-request gap of
//! `max(1 / max_reqs_per_sec, 0.001)` seconds between real (non-cached,
//! non-skipped) requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug)]
pub struct RateLimiter {
    min_gap: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_reqs_per_sec: f64) -> Self {
        let gap_secs = (1.0 / max_reqs_per_sec.max(f64::MIN_POSITIVE)).max(0.001);
        Self {
            min_gap: Duration::from_secs_f64(gap_secs),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Blocks until the minimum gap since the last real request has
    /// elapsed, then records this call as the new last real request.
    pub async fn wait_turn(&self) {
        loop {
            let now = Instant::now();
            let mut last = self.last_request.lock().await;
            match *last {
                Some(prev) if now.duration_since(prev) < self.min_gap => {
                    let remaining = self.min_gap - now.duration_since(prev);
                    drop(last);
                    tokio::time::sleep(remaining).await;
                }
                _ => {
                    *last = Some(now);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_minimum_gap() {
        let limiter = RateLimiter::new(100.0);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait_turn().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(19));
    }

    #[test]
    fn clamps_to_minimum_one_millisecond() {
        let limiter = RateLimiter::new(1_000_000.0);
        assert!(limiter.min_gap >= Duration::from_millis(1));
    }
}
