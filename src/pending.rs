use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use crate::error::{BridgeError, BridgeResult, LockResultExt, OperationError};
use crate::Promise;

/// Write side of a [`PendingOperation`]. Handed to the wrapped operation so
/// its callback can report the outcome.
///
/// Settlers may be cloned freely. Only the first settlement across all
/// clones is kept; later ones are ignored. Dropping every settler without
/// settling leaves the operation pending until its waiter gives up.
///
/// # Examples
///
/// ```
/// use settle_bridge::{Promise, Settler};
/// use futures::executor::block_on;
/// use std::thread;
/// let (settler, pending) = Settler::<u32>::new();
///
/// let task1 = thread::spawn(move || block_on(async {
///     assert_eq!(pending.await, Ok(42));
/// }));
/// settler.resolve(42);
/// task1.join().expect("The task1 thread has panicked.");
/// ```
#[derive(Debug)]
pub struct Settler<T> {
    shared: Arc<Shared<T>>,
}

/// Read side of one in-flight operation.
///
/// Awaiting it (or calling [`wait_timeout`](Self::wait_timeout)) yields the
/// settled outcome exactly once.
#[derive(Debug)]
pub struct PendingOperation<T> {
    shared: Arc<Shared<T>>,
}

#[derive(Debug)]
enum Slot<T> {
    Pending,
    Settled(Result<T, OperationError>),
    Delivered,
}

#[derive(Debug)]
struct Inner<T> {
    slot: Slot<T>,
    waker: Option<Waker>,
}

#[derive(Debug)]
struct Shared<T> {
    inner: Mutex<Inner<T>>,
    changed: Condvar,
    started: Instant,
}

impl<T> Shared<T> {
    fn lock(&self, context: &str) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().recover_poison(context)
    }

    fn notify(&self, inner: &mut Inner<T>) {
        if let Some(waker) = inner.waker.take() {
            waker.wake()
        }
        self.changed.notify_all();
    }
}

/// Hands out the outcome if there is one. The slot is left `Delivered` so
/// nothing can be read or written twice.
fn take_outcome<T>(slot: &mut Slot<T>) -> Option<BridgeResult<T>> {
    match std::mem::replace(slot, Slot::Delivered) {
        Slot::Settled(result) => Some(result.map_err(BridgeError::from)),
        Slot::Pending => {
            *slot = Slot::Pending;
            None
        }
        Slot::Delivered => None,
    }
}

impl<T> Settler<T> {
    /// Record the outcome of the operation.
    ///
    /// Returns `true` if this call settled the operation and `false` if an
    /// earlier settlement (or an expiry) already won.
    pub fn settle(&self, result: Result<T, OperationError>) -> bool {
        let mut inner = self.shared.lock("Settler::settle");
        if !matches!(inner.slot, Slot::Pending) {
            log::debug!(
                target: "settle_bridge::pending",
                "Ignoring settlement after {:?}; operation already closed",
                self.shared.started.elapsed()
            );
            return false;
        }
        inner.slot = Slot::Settled(result);
        self.shared.notify(&mut inner);
        true
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self.shared.lock("Settler::is_settled").slot, Slot::Pending)
    }
}

impl<T> Clone for Settler<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Promise<T> for Settler<T> {
    type Waiter = PendingOperation<T>;

    fn new() -> (Self, Self::Waiter) {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                slot: Slot::Pending,
                waker: None,
            }),
            changed: Condvar::new(),
            started: Instant::now(),
        });
        (
            Self {
                shared: shared.clone(),
            },
            PendingOperation { shared },
        )
    }

    fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    fn reject(self, err: OperationError) {
        self.settle(Err(err));
    }
}

impl<T> PendingOperation<T> {
    /// The settled predicate: true once the operation's callback has fired
    /// or the outcome was closed. Dropped settlers do not count.
    pub fn is_settled(&self) -> bool {
        !matches!(
            self.shared.lock("PendingOperation::is_settled").slot,
            Slot::Pending
        )
    }

    /// Time since the operation was issued.
    pub fn elapsed(&self) -> Duration {
        self.shared.started.elapsed()
    }

    /// Close the operation.
    ///
    /// An existing settlement wins and is returned. Otherwise `reason` becomes
    /// the outcome and any settlement that arrives later is discarded.
    pub fn expire(self, reason: BridgeError) -> BridgeResult<T> {
        let mut inner = self.shared.lock("PendingOperation::expire");
        if let Some(outcome) = take_outcome(&mut inner.slot) {
            return outcome;
        }
        log::debug!(
            target: "settle_bridge::pending",
            "Expiring operation after {:?}: {}",
            self.shared.started.elapsed(),
            reason
        );
        inner.slot = Slot::Delivered;
        Err(reason)
    }

    /// Block the current thread until the operation settles or `timeout`
    /// passes, whichever comes first. A timeout too large to represent as an
    /// instant means no deadline.
    pub fn wait_timeout(self, timeout: Duration) -> BridgeResult<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.shared.lock("PendingOperation::wait_timeout");
        loop {
            if let Some(outcome) = take_outcome(&mut inner.slot) {
                return outcome;
            }
            inner = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        inner.slot = Slot::Delivered;
                        return Err(BridgeError::Timeout { waited: timeout });
                    }
                    self.shared
                        .changed
                        .wait_timeout(inner, deadline - now)
                        .recover_poison("PendingOperation::wait_timeout")
                        .0
                }
                None => self
                    .shared
                    .changed
                    .wait(inner)
                    .recover_poison("PendingOperation::wait_timeout"),
            };
        }
    }
}

impl<T> Future for PendingOperation<T> {
    type Output = BridgeResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.shared.lock("PendingOperation::poll");
        match take_outcome(&mut inner.slot) {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                inner.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
