use std::collections::VecDeque;

use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::debug;

use super::types::RequestBudget;

/// Sliding-window request limiter shared by every request a client issues.
///
/// Each successful [`acquire`](RateLimiter::acquire) records a grant that
/// occupies one slot for `budget.window`. When all slots are occupied the
/// caller sleeps until the oldest grant expires.
///
/// Waiters queue on a `tokio::sync::Mutex`, which hands the lock out in FIFO
/// order, so callers are admitted in the order they started waiting. The
/// lock is held while sleeping; only the head of the queue watches the clock.
#[derive(Debug)]
pub struct RateLimiter {
    budget: RequestBudget,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(budget: RequestBudget) -> Self {
        Self {
            budget,
            grants: Mutex::new(VecDeque::with_capacity(budget.max_requests as usize)),
        }
    }

    pub fn budget(&self) -> RequestBudget {
        self.budget
    }

    /// Wait for a free slot and consume it.
    pub async fn acquire(&self) {
        let capacity = self.budget.max_requests as usize;
        let mut grants = self.grants.lock().await;

        loop {
            let now = Instant::now();
            while let Some(&oldest) = grants.front() {
                if now.duration_since(oldest) >= self.budget.window {
                    grants.pop_front();
                } else {
                    break;
                }
            }

            if grants.len() < capacity {
                grants.push_back(now);
                return;
            }

            let Some(&oldest) = grants.front() else {
                continue;
            };
            let ready_at = oldest + self.budget.window;
            debug!(
                wait_ms = ready_at.duration_since(now).as_millis() as u64,
                in_window = grants.len(),
                "request budget exhausted, waiting for a slot"
            );
            time::sleep_until(ready_at).await;
        }
    }

    /// Slots still free in the current window.
    ///
    /// Never waits: `None` while an acquirer holds the queue, which is the
    /// case for as long as a caller sleeps on an exhausted budget.
    pub fn available(&self) -> Option<usize> {
        let grants = self.grants.try_lock().ok()?;
        let now = Instant::now();
        let live = grants
            .iter()
            .filter(|granted| now.duration_since(**granted) < self.budget.window)
            .count();
        Some((self.budget.max_requests as usize).saturating_sub(live))
    }
}
