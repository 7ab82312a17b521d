use std::time::Duration;
use tokio::time::{Instant, sleep};

/// A poll budget: explicit timeout, fixed interval.
///
/// ```ignore
/// let deadline = Deadline::after(timeout, interval);
/// loop {
///     if check().await? { break; }
///     if !deadline.tick().await { break; }
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    until: Instant,
    interval: Duration,
}

impl Deadline {
    pub fn after(timeout: Duration, interval: Duration) -> Self {
        Self {
            until: Instant::now() + timeout,
            interval,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.until.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Sleeps one interval (capped by what is left). Returns false once expired.
    pub async fn tick(&self) -> bool {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return false;
        }
        sleep(self.interval.min(remaining)).await;
        true
    }
}

/// Settle pause after an action that makes the page react.
pub async fn settle(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}
