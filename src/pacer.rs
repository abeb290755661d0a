//! Rate-limited sequential task queue.
//!
//! The provisioning and bulk-login tools push their network calls through a
//! `PacedQueue`, which spaces item starts by a minimum interval and captures
//! one outcome per item. Failures are isolated per item; the queue itself
//! never fails.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Captured result of one paced item
#[derive(Debug, Clone)]
pub struct ItemOutcome<T> {
    pub label: String,
    pub outcome: Result<T, String>,
}

impl<T> ItemOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Spaces item starts by at least the configured interval
#[derive(Debug)]
pub struct PacedQueue {
    interval: Duration,
    next_start: Option<Instant>,
}

impl PacedQueue {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            next_start: None,
        }
    }

    /// Wait out the interval, run the task, capture its outcome.
    ///
    /// The first item starts immediately; each later item starts no sooner
    /// than `interval` after the previous item's start.
    pub async fn run<T, E, F, Fut>(&mut self, label: &str, task: F) -> ItemOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if let Some(next_start) = self.next_start {
            sleep_until(next_start).await;
        }
        self.next_start = Some(Instant::now() + self.interval);

        debug!("Paced item start: {}", label);
        let outcome = task().await.map_err(|e| e.to_string());
        ItemOutcome {
            label: label.to_string(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_item_starts_are_spaced_by_the_interval() {
        let mut queue = PacedQueue::new(300);
        let mut starts = Vec::new();

        for i in 0..3 {
            let outcome = queue
                .run(&format!("item-{}", i), || async {
                    Ok::<_, std::convert::Infallible>(Instant::now())
                })
                .await;
            starts.push(outcome.outcome.unwrap());
        }

        assert!(starts[1] - starts[0] >= Duration::from_millis(300));
        assert!(starts[2] - starts[1] >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_item_starts_immediately() {
        let mut queue = PacedQueue::new(10_000);
        let before = Instant::now();
        queue
            .run("first", || async { Ok::<_, std::convert::Infallible>(()) })
            .await;
        assert!(Instant::now() - before < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_captured_not_propagated() {
        let mut queue = PacedQueue::new(1);

        let failed = queue
            .run("bad", || async { Err::<(), _>("request refused") })
            .await;
        assert!(!failed.is_success());
        assert_eq!(failed.outcome.unwrap_err(), "request refused");
        assert_eq!(failed.label, "bad");

        // The queue keeps running after a failure
        let ok = queue.run("good", || async { Ok::<_, String>(7) }).await;
        assert_eq!(ok.outcome.unwrap(), 7);
    }
}
