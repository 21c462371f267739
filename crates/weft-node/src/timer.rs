//! Tokio-backed single rearmable timer.
//!
//! The tick scheduler arms exactly one real timer per manager. `TickTimer`
//! is the node-loop side of that contract: `arm`/`cancel` mirror the
//! `TimerService` calls, and `expired` is a select-friendly future that
//! completes at the armed deadline and pends forever while unarmed.

use std::time::Duration;

use tokio::time::Instant;

/// The one real timer backing a manager's tick scheduler.
#[derive(Debug, Default)]
pub struct TickTimer {
    deadline: Option<Instant>,
}

impl TickTimer {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm (or re-arm) the timer `duration` from now.
    pub fn arm(&mut self, duration: Duration) {
        self.deadline = Some(Instant::now() + duration);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the armed deadline. Pends forever while unarmed, so it is
    /// safe to select on unconditionally in the node loop.
    pub async fn expired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn armed_timer_expires_at_deadline() {
        let mut timer = TickTimer::new();
        timer.arm(Duration::from_millis(600));
        assert!(timer.is_armed());

        timer.expired().await;
        assert!(!timer.is_armed(), "deadline consumed on expiry");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let mut timer = TickTimer::new();
        timer.arm(Duration::from_millis(100));
        timer.cancel();

        tokio::time::advance(Duration::from_secs(10)).await;
        let fired = tokio::time::timeout(Duration::from_millis(1), timer.expired())
            .await
            .is_ok();
        assert!(!fired, "cancelled timer must pend forever");
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_moves_the_deadline() {
        let mut timer = TickTimer::new();
        timer.arm(Duration::from_millis(100));
        timer.arm(Duration::from_millis(500));

        // The first deadline passes without the future completing.
        tokio::time::advance(Duration::from_millis(200)).await;
        let fired = tokio::time::timeout(Duration::from_millis(1), timer.expired())
            .await
            .is_ok();
        assert!(!fired, "old deadline must not fire after re-arm");

        // The new deadline does complete.
        timer.expired().await;
    }
}
