//! Bridged access to the internal API collaborator.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::bridge::{AsyncResultBridge, BridgeHandle};
use crate::config::BridgeConfig;
use crate::error::{BridgeResult, OperationError};

/// Callback handed to the internal API. It may be invoked any number of
/// times; only the first invocation is honoured.
pub type ApiCallback = Box<dyn Fn(Result<Value, OperationError>) + Send + Sync + 'static>;

/// An API reachable only through a completion callback, such as one that
/// runs inside a browser automation context.
pub trait InternalApi: Send + Sync {
    /// Start `namespace.method(args...)`. `callback` reports the outcome at
    /// some later point, possibly on another thread.
    fn call(&self, namespace: &str, method: &str, args: Vec<Value>, callback: ApiCallback);
}

impl<A: InternalApi + ?Sized> InternalApi for Arc<A> {
    fn call(&self, namespace: &str, method: &str, args: Vec<Value>, callback: ApiCallback) {
        (**self).call(namespace, method, args, callback)
    }
}

/// Wraps an [`InternalApi`] so each call settles exactly once.
pub struct InternalApiClient<A> {
    api: A,
    bridge: AsyncResultBridge,
}

impl<A: InternalApi> InternalApiClient<A> {
    pub fn new(api: A, config: &BridgeConfig) -> Self {
        Self {
            api,
            bridge: AsyncResultBridge::new(config),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        self.bridge.config()
    }

    fn issue(&self, namespace: &str, method: &str, args: Vec<Value>) -> impl FnOnce(crate::Settler<Value>) + '_ {
        let namespace = namespace.to_string();
        let method = method.to_string();
        move |settler| {
            log::trace!(
                target: "settle_bridge::api",
                "Calling {}.{} with {} argument(s)",
                namespace,
                method,
                args.len()
            );
            let callback: ApiCallback = Box::new(move |result| {
                settler.settle(result);
            });
            self.api.call(&namespace, &method, args, callback);
        }
    }

    /// Callback style: `on_settled` fires exactly once from the poll thread.
    pub fn invoke<Cb>(&self, namespace: &str, method: &str, args: Vec<Value>, on_settled: Cb) -> BridgeHandle
    where
        Cb: FnOnce(BridgeResult<Value>) + Send + 'static,
    {
        self.bridge.invoke(self.issue(namespace, method, args), on_settled)
    }

    pub fn call_blocking(&self, namespace: &str, method: &str, args: Vec<Value>) -> BridgeResult<Value> {
        self.bridge.invoke_blocking(self.issue(namespace, method, args))
    }

    pub async fn call(&self, namespace: &str, method: &str, args: Vec<Value>) -> BridgeResult<Value> {
        self.bridge.call(self.issue(namespace, method, args)).await
    }

    pub async fn call_with_cancel(
        &self,
        namespace: &str,
        method: &str,
        args: Vec<Value>,
        cancel: CancellationToken,
    ) -> BridgeResult<Value> {
        self.bridge
            .call_with_cancel(self.issue(namespace, method, args), cancel)
            .await
    }

    /// Await the call and decode the settled value into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        namespace: &str,
        method: &str,
        args: Vec<Value>,
    ) -> BridgeResult<T> {
        let value = self.call(namespace, method, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}
