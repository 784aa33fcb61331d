//! Timed polling of a settled predicate.
//!
//! A [`PollLoop`] checks a predicate at a fixed interval until it holds, the
//! timeout elapses, or its cancellation token fires. It reports which of the
//! three happened exactly once.

use std::thread;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;

/// Shortest interval a poll loop will sleep between checks.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Stand-in deadline for timeouts too large to add to an instant.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied { elapsed: Duration },
    TimedOut { elapsed: Duration },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PollLoop {
    interval: Duration,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl PollLoop {
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            timeout,
            cancel: None,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.poll_interval(), config.wait_timeout())
    }

    /// Stop polling as soon as `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Poll on the current thread.
    ///
    /// The predicate is checked before the deadline on every tick, so a
    /// settlement observed at the deadline still counts as satisfied. The
    /// last sleep is shortened so the deadline is never overshot.
    pub fn run<P>(&self, mut predicate: P) -> PollOutcome
    where
        P: FnMut() -> bool,
    {
        let started = Instant::now();
        loop {
            if predicate() {
                return PollOutcome::Satisfied {
                    elapsed: started.elapsed(),
                };
            }
            if self.is_cancelled() {
                log::debug!(target: "settle_bridge::poll_loop", "Poll loop cancelled");
                return PollOutcome::Cancelled;
            }
            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                log::debug!(
                    target: "settle_bridge::poll_loop",
                    "Predicate still false after {:?}",
                    elapsed
                );
                return PollOutcome::TimedOut { elapsed };
            }
            thread::sleep(self.interval.min(self.timeout - elapsed));
        }
    }

    /// Poll cooperatively on tokio's timer instead of blocking a thread.
    pub async fn run_async<P>(&self, mut predicate: P) -> PollOutcome
    where
        P: FnMut() -> bool,
    {
        let started = tokio::time::Instant::now();
        let deadline = started
            .checked_add(self.timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let cancel = self.cancel.clone().unwrap_or_default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!(target: "settle_bridge::poll_loop", "Poll loop cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = ticker.tick() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }

            if predicate() {
                return PollOutcome::Satisfied {
                    elapsed: started.elapsed(),
                };
            }
            if tokio::time::Instant::now() >= deadline {
                let elapsed = started.elapsed();
                log::debug!(
                    target: "settle_bridge::poll_loop",
                    "Predicate still false after {:?}",
                    elapsed
                );
                return PollOutcome::TimedOut { elapsed };
            }
        }
    }
}
