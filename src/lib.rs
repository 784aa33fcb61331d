//! Single-settlement bridge for callback-style operations.
//!
//! An operation that reports through a callback (possibly many times, or
//! never) is turned into a result that is delivered exactly once: the first
//! settlement, a timeout, or a cancellation.
//!
//! ```
//! use settle_bridge::{AsyncResultBridge, BridgeConfig, Promise};
//! use std::thread;
//! let bridge = AsyncResultBridge::new(&BridgeConfig::default());
//! let outcome = bridge.invoke_blocking(|settler| {
//!     thread::spawn(move || settler.resolve("done"));
//! });
//! assert_eq!(outcome, Ok("done"));
//! ```

pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod pending;
pub mod poll_loop;

pub use api::{ApiCallback, InternalApi, InternalApiClient};
pub use bridge::{AsyncResultBridge, BridgeHandle};
pub use config::{BridgeConfig, ConfigError};
pub use error::{BridgeError, BridgeResult, OperationError};
pub use pending::{PendingOperation, Settler};
pub use poll_loop::{PollLoop, PollOutcome};

/// The write half of a one-shot operation.
pub trait Promise<T> {
    type Waiter;

    fn new() -> (Self, Self::Waiter)
    where
        Self: Sized;

    fn resolve(self, value: T);

    fn reject(self, err: OperationError);
}
