//! Error types delivered to the terminal callback of a bridged operation.
//!
//! Nothing in this crate panics or throws to report a failed operation. Every
//! failure reaches the caller as the `Err` side of a [`BridgeResult`].

use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// Error reported by the internal API collaborator itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation failed with code {code}: {msg}")]
pub struct OperationError {
    pub code: i64,
    pub msg: String,
}

impl OperationError {
    pub fn new(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }
}

/// Every way a bridged operation can end without a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The operation settled with an error.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// The operation did not settle before the wait timeout elapsed.
    #[error("operation did not settle within {waited:?}")]
    Timeout { waited: Duration },

    /// The caller abandoned interest before the operation settled.
    #[error("operation was cancelled before it settled")]
    Cancelled,

    /// The settled value could not be decoded into the requested type.
    #[error("failed to decode settled value: {0}")]
    Decode(String),
}

impl BridgeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::Timeout { .. })
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Decode(err.to_string())
    }
}

/// Result type for bridged operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Recover a guard from a poisoned lock instead of propagating the panic.
pub(crate) trait LockResultExt<G> {
    fn recover_poison(self, context: &str) -> G;
}

impl<G> LockResultExt<G> for Result<G, PoisonError<G>> {
    fn recover_poison(self, context: &str) -> G {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "settle_bridge::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn operation_error_converts_into_bridge_error() {
        let err: BridgeError = OperationError::new(500, "fail").into();
        assert_eq!(err, BridgeError::Operation(OperationError::new(500, "fail")));
        assert_eq!(err.to_string(), "operation failed with code 500: fail");
    }

    #[test]
    fn timeout_is_reported_as_timeout() {
        let err = BridgeError::Timeout {
            waited: Duration::from_millis(200),
        };
        assert!(err.is_timeout());
        assert!(!BridgeError::Cancelled.is_timeout());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let lock = Arc::new(Mutex::new(7));
        let poisoner = lock.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(lock.is_poisoned());
        let guard = lock.lock().recover_poison("poisoned_lock_is_recovered");
        assert_eq!(*guard, 7);
    }
}
