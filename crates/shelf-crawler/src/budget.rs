use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Request budget shared by every worker of a crawl
#[derive(Debug)]
pub struct CrawlBudget {
    issued: AtomicUsize,
    max: usize,
}

impl CrawlBudget {
    pub fn new(max_requests: usize) -> Self {
        Self {
            issued: AtomicUsize::new(0),
            max: max_requests,
        }
    }

    /// Reserves the next request, returns its 1-based index
    pub fn try_issue(&self) -> Option<usize> {
        self.issued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max).then_some(n + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn is_exhausted(&self) -> bool {
        self.issued() >= self.max
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CrawlClock {
    started: Instant,
}

impl CrawlClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Requests per second since the crawl started
    pub fn frequency(&self, requests: usize) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            requests as f64 / secs
        } else {
            0.0
        }
    }
}

/// External stop signal, checked before every query
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`StopHandle::stop`] has been called
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, the channel cannot close here
        rx.wait_for(|stopped| *stopped).await.ok();
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_issues_up_to_max() {
        let budget = CrawlBudget::new(3);
        assert_eq!(Some(1), budget.try_issue());
        assert_eq!(Some(2), budget.try_issue());
        assert!(!budget.is_exhausted());
        assert_eq!(Some(3), budget.try_issue());
        assert!(budget.is_exhausted());
        assert_eq!(None, budget.try_issue());
        assert_eq!(3, budget.issued());
    }

    #[test]
    fn stop_handle_is_shared() {
        let stop = StopHandle::new();
        let other = stop.clone();
        assert!(!other.is_stopped());
        stop.stop();
        assert!(other.is_stopped());
    }
}
