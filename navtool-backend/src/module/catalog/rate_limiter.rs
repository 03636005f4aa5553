///! Rolling-window request throttle for the NOAA services
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Allows at most `max_requests` acquisitions in any rolling `window`.
///
/// Waiters are served in arrival order: the queue lock is fair and is held
/// while the head waiter sleeps, so later callers cannot overtake it.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    issued: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            issued: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a request slot is free, then claim it. Never fails.
    pub async fn acquire(&self) {
        let mut issued = self.issued.lock().await;

        loop {
            let now = Instant::now();
            Self::prune(&mut issued, now, self.window);

            if issued.len() < self.max_requests {
                issued.push_back(now);
                return;
            }

            // Queue is full, so it has a front entry
            if let Some(oldest) = issued.front().copied() {
                let ready_at = oldest + self.window;
                tracing::trace!(
                    "Rate limit reached ({} per {:?}), waiting {:?}",
                    self.max_requests,
                    self.window,
                    ready_at.saturating_duration_since(now)
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }

    /// Requests counted against the current window.
    pub async fn outstanding(&self) -> usize {
        let mut issued = self.issued.lock().await;
        Self::prune(&mut issued, Instant::now(), self.window);
        issued.len()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn prune(issued: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = issued.front() {
            if now.duration_since(*front) >= window {
                issued.pop_front();
            } else {
                break;
            }
        }
    }
}
