use std::collections::VecDeque;

use log::debug;
use tokio::time::{sleep, Duration, Instant};

/// Sliding-window admission control for outbound inference requests.
///
/// Bounds the number of requests in the trailing window rather than per
/// fixed bucket, so bursts are smoothed to the instantaneous rate instead
/// of resetting at minute boundaries. Has no failure path; the worst case
/// is suspending the caller until the oldest request ages out.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    request_times: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: usize) -> Self {
        Self {
            max_requests: requests_per_minute,
            window: Duration::from_secs(60),
            request_times: VecDeque::new(),
        }
    }

    /// Wait until one more request fits in the trailing window, then record it.
    pub async fn acquire(&mut self) {
        let now = Instant::now();

        while let Some(&oldest) = self.request_times.front() {
            if now.duration_since(oldest) > self.window {
                self.request_times.pop_front();
            } else {
                break;
            }
        }

        if self.request_times.len() >= self.max_requests {
            if let Some(&oldest) = self.request_times.front() {
                let wait = (oldest + self.window).saturating_duration_since(now);
                if !wait.is_zero() {
                    debug!("rate limit reached, waiting {}ms", wait.as_millis());
                    sleep(wait).await;
                }
            }
        }

        self.request_times.push_back(Instant::now());
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.request_times.len()
    }
}
