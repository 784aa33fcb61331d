//! Adapts a callback-style operation into a wait that settles exactly once.
//!
//! The wrapped operation receives a [`Settler`] and reports through it
//! whenever its own callback fires. The bridge then either polls the settled
//! flag ([`AsyncResultBridge::invoke`], [`AsyncResultBridge::invoke_blocking`],
//! [`AsyncResultBridge::call_polled`]) or awaits it directly with a deadline
//! ([`AsyncResultBridge::call`]). Whichever path is used, the operation's
//! first settlement, the timeout and cancellation race for a single slot and
//! only the winner is delivered.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::pending::{PendingOperation, Settler};
use crate::poll_loop::{PollLoop, PollOutcome};
use crate::Promise;

#[derive(Debug, Clone, Default)]
pub struct AsyncResultBridge {
    config: BridgeConfig,
}

/// Handle to a poll loop started by [`AsyncResultBridge::invoke`].
///
/// Dropping the handle detaches the loop; the terminal callback still fires.
#[derive(Debug)]
pub struct BridgeHandle {
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl BridgeHandle {
    /// Abandon interest in the operation. Unless it already settled, the
    /// terminal callback receives `BridgeError::Cancelled` on the next tick.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the terminal callback to return. Fails only if the callback
    /// panicked.
    pub fn join(self) -> thread::Result<()> {
        self.worker.join()
    }
}

/// Turn the way a poll loop ended into the delivered outcome.
///
/// A satisfied loop always finds a settlement in the slot, so `reason` only
/// takes effect when the loop gave up first.
fn conclude<T>(pending: PendingOperation<T>, outcome: PollOutcome, timeout: Duration) -> BridgeResult<T> {
    let reason = match outcome {
        PollOutcome::Satisfied { elapsed } => {
            log::trace!(
                target: "settle_bridge::bridge",
                "Operation settled, observed after {:?}",
                elapsed
            );
            BridgeError::Timeout { waited: timeout }
        }
        PollOutcome::TimedOut { .. } => BridgeError::Timeout { waited: timeout },
        PollOutcome::Cancelled => BridgeError::Cancelled,
    };
    pending.expire(reason)
}

impl AsyncResultBridge {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn issue<T, Op>(&self, operation: Op) -> PendingOperation<T>
    where
        Op: FnOnce(Settler<T>),
    {
        let (settler, pending) = Settler::<T>::new();
        operation(settler);
        pending
    }

    /// Issue `operation` now and poll for its settlement on a dedicated
    /// thread. `on_settled` is called exactly once, from that thread.
    ///
    /// # Examples
    ///
    /// ```
    /// use settle_bridge::{AsyncResultBridge, BridgeConfig, Promise};
    /// use std::sync::mpsc::channel;
    /// use std::thread;
    /// let bridge = AsyncResultBridge::new(&BridgeConfig::default());
    /// let (tx, rx) = channel();
    ///
    /// let handle = bridge.invoke(
    ///     |settler| {
    ///         thread::spawn(move || settler.resolve(42));
    ///     },
    ///     move |result| tx.send(result).unwrap(),
    /// );
    /// handle.join().expect("The callback has panicked.");
    /// assert_eq!(rx.recv().unwrap(), Ok(42));
    /// ```
    pub fn invoke<T, Op, Cb>(&self, operation: Op, on_settled: Cb) -> BridgeHandle
    where
        T: Send + 'static,
        Op: FnOnce(Settler<T>),
        Cb: FnOnce(BridgeResult<T>) + Send + 'static,
    {
        let pending = self.issue(operation);
        let cancel = CancellationToken::new();
        let poll = PollLoop::from_config(&self.config).with_cancellation(cancel.clone());
        let worker = thread::spawn(move || {
            let outcome = poll.run(|| pending.is_settled());
            on_settled(conclude(pending, outcome, poll.timeout()));
        });
        BridgeHandle { cancel, worker }
    }

    /// Issue `operation` and poll for its settlement on the calling thread.
    pub fn invoke_blocking<T, Op>(&self, operation: Op) -> BridgeResult<T>
    where
        Op: FnOnce(Settler<T>),
    {
        let pending = self.issue(operation);
        let poll = PollLoop::from_config(&self.config);
        let outcome = poll.run(|| pending.is_settled());
        conclude(pending, outcome, poll.timeout())
    }

    /// Issue `operation` and poll its settled flag on tokio's timer.
    ///
    /// Keeps the polling shape for operations whose settlement can only be
    /// observed, never awaited.
    pub async fn call_polled<T, Op>(&self, operation: Op, cancel: CancellationToken) -> BridgeResult<T>
    where
        Op: FnOnce(Settler<T>),
    {
        let pending = self.issue(operation);
        let poll = PollLoop::from_config(&self.config).with_cancellation(cancel);
        let outcome = poll.run_async(|| pending.is_settled()).await;
        conclude(pending, outcome, poll.timeout())
    }

    /// Issue `operation` and await its settlement with the configured
    /// deadline.
    pub async fn call<T, Op>(&self, operation: Op) -> BridgeResult<T>
    where
        Op: FnOnce(Settler<T>),
    {
        self.call_with_cancel(operation, CancellationToken::new()).await
    }

    pub async fn call_with_cancel<T, Op>(&self, operation: Op, cancel: CancellationToken) -> BridgeResult<T>
    where
        Op: FnOnce(Settler<T>),
    {
        let mut pending = self.issue(operation);
        let timeout = self.config.wait_timeout();
        let reason = tokio::select! {
            biased;
            outcome = &mut pending => return outcome,
            _ = tokio::time::sleep(timeout) => BridgeError::Timeout { waited: timeout },
            _ = cancel.cancelled() => BridgeError::Cancelled,
        };
        pending.expire(reason)
    }
}
