use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);

/// Rolling-window request budget shared by every worker of a client.
///
/// Keeps the dispatch instant of each request still inside the window. A
/// caller that would exceed the budget sleeps until the oldest request ages
/// out; acquiring never fails.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests as usize, WINDOW)
    }

    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            sent: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut sent = self.sent.lock().await;
                let now = Instant::now();
                while let Some(&oldest) = sent.front() {
                    if now.duration_since(oldest) >= self.window {
                        sent.pop_front();
                    } else {
                        break;
                    }
                }
                match sent.front() {
                    Some(&oldest) if sent.len() >= self.max_requests => {
                        self.window - now.duration_since(oldest)
                    }
                    _ => {
                        sent.push_back(now);
                        return;
                    }
                }
            };
            debug!(
                wait_ms = wait.as_millis() as u64,
                budget = self.max_requests,
                "Request budget exhausted, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests dispatched within the current window.
    pub async fn in_window(&self) -> usize {
        let sent = self.sent.lock().await;
        let now = Instant::now();
        sent.iter()
            .filter(|&&at| now.duration_since(at) < self.window)
            .count()
    }
}

/// Minimum spacing between consecutive requests of a single worker.
pub(crate) struct Pacer {
    spacing: Duration,
    last: std::sync::Mutex<Option<Instant>>,
}

impl Pacer {
    pub(crate) fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last: std::sync::Mutex::new(None),
        }
    }

    pub(crate) async fn ready(&self) {
        if self.spacing.is_zero() {
            return;
        }
        let due = self
            .last
            .lock()
            .ok()
            .and_then(|last| last.map(|at| at + self.spacing));
        if let Some(due) = due {
            tokio::time::sleep_until(due).await;
        }
    }

    pub(crate) fn mark(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    #[tokio::test(start_paused = true)]
    async fn window_budget_is_never_exceeded() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();

        let mut times: Vec<Duration> = join_all((0..12).map(|_| async {
            limiter.acquire().await;
            start.elapsed()
        }))
        .await;
        times.sort();

        assert_eq!(times.len(), 12);
        for pair in times.windows(6) {
            assert!(
                pair[5] - pair[0] >= Duration::from_secs(60),
                "six requests inside one window: {pair:?}"
            );
        }
        assert_eq!(times[4], Duration::ZERO);
        assert!(times[5] >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn budget_recovers_after_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.in_window().await, 2);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(limiter.in_window().await, 0);

        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_spaces_consecutive_requests() {
        let pacer = Pacer::new(Duration::from_secs(2));
        let start = Instant::now();

        pacer.ready().await;
        pacer.mark();
        pacer.ready().await;
        pacer.mark();

        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}
