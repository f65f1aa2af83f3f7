//! Cooldown countdown for UI display.
//!
//! The rate limiter only returns scheduling data; it never waits. Hosts that
//! want a live "try again in Ns" counter start a `CooldownTicker`, which
//! publishes the remaining milliseconds on a watch channel until it reaches
//! zero. Cancel it (or drop it) on teardown.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Default refresh period of the countdown.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

pub struct CooldownTicker {
    handle: Option<JoinHandle<()>>,
    receiver: watch::Receiver<u64>,
}

impl CooldownTicker {
    /// Start counting down `cooldown_ms`. Must be called inside a tokio runtime.
    pub fn start(cooldown_ms: u64, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let (sender, receiver) = watch::channel(cooldown_ms);
        let deadline = Instant::now() + Duration::from_millis(cooldown_ms);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let remaining = deadline.saturating_duration_since(Instant::now()).as_millis() as u64;
                if sender.send(remaining).is_err() || remaining == 0 {
                    break;
                }
            }
            debug!("Cooldown ticker finished");
        });

        Self {
            handle: Some(handle),
            receiver,
        }
    }

    /// Last published remaining time.
    pub fn remaining(&self) -> u64 {
        *self.receiver.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.receiver.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait until the countdown reaches zero. Returns immediately if cancelled.
    pub async fn finished(&self) {
        let mut receiver = self.receiver.clone();
        let _ = receiver.wait_for(|remaining| *remaining == 0).await;
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Cooldown ticker cancelled");
        }
    }
}

impl Drop for CooldownTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for CooldownTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownTicker")
            .field("remaining", &self.remaining())
            .field("running", &self.is_running())
            .finish()
    }
}
