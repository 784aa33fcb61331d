use serde_json::{json, Value};
use settle_bridge::{
    ApiCallback, BridgeConfig, BridgeError, InternalApi, InternalApiClient, OperationError,
};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Runs every call on its own thread, the way an automation harness answers
/// from a separate execution context.
struct HarnessApi {
    delay: Duration,
    parked: Mutex<Vec<ApiCallback>>,
}

impl HarnessApi {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            parked: Mutex::new(Vec::new()),
        }
    }
}

impl InternalApi for HarnessApi {
    fn call(&self, _namespace: &str, method: &str, args: Vec<Value>, callback: ApiCallback) {
        match method {
            "never" => self.parked.lock().unwrap().push(callback),
            "fail" => {
                let delay = self.delay;
                thread::spawn(move || {
                    thread::sleep(delay);
                    callback(Err(OperationError::new(500, "fail")));
                    callback(Ok(json!("too late")));
                });
            }
            _ => {
                let delay = self.delay;
                thread::spawn(move || {
                    thread::sleep(delay);
                    callback(Ok(json!({ "id": 42, "args": args })));
                });
            }
        }
    }
}

fn config(timeout_ms: u64, interval_ms: u64) -> BridgeConfig {
    BridgeConfig::with_timing(
        Duration::from_millis(timeout_ms),
        Duration::from_millis(interval_ms),
    )
    .unwrap()
}

#[test]
fn test_success_arrives_after_operation_settles() {
    init_logging();
    let client = InternalApiClient::new(HarnessApi::new(Duration::from_millis(50)), &config(30_000, 100));
    let (tx, rx) = channel();
    let started = Instant::now();
    let handle = client.invoke("admin", "getTenant", vec![json!(1)], move |result| {
        tx.send((result, started.elapsed())).unwrap();
    });
    handle.join().expect("The callback thread has panicked");

    let (result, elapsed) = rx.recv().unwrap();
    let value = result.unwrap();
    assert_eq!(value["id"], 42);
    assert_eq!(value["args"], json!([1]));
    assert!(elapsed >= Duration::from_millis(50));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_error_is_delivered_once() {
    init_logging();
    let client = InternalApiClient::new(HarnessApi::new(Duration::from_millis(10)), &config(30_000, 20));
    let (tx, rx) = channel();
    client
        .invoke("config", "fail", vec![], move |result| tx.send(result).unwrap())
        .join()
        .expect("The callback thread has panicked");

    assert_eq!(
        rx.recv().unwrap(),
        Err(BridgeError::Operation(OperationError::new(500, "fail")))
    );
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_timeout_when_operation_never_settles() {
    init_logging();
    let api = Arc::new(HarnessApi::new(Duration::ZERO));
    let client = InternalApiClient::new(api.clone(), &config(200, 50));
    let started = Instant::now();
    let err = client.call_blocking("admin", "never", vec![]).unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(
        err,
        BridgeError::Timeout {
            waited: Duration::from_millis(200)
        }
    );

    // A callback firing after the timeout changes nothing.
    for callback in api.parked.lock().unwrap().iter() {
        callback(Ok(json!("late")));
    }
}

#[tokio::test]
async fn test_async_call_against_harness() {
    init_logging();
    let client = InternalApiClient::new(HarnessApi::new(Duration::from_millis(20)), &config(5_000, 100));
    let value = client.call("admin", "getTenant", vec![json!("cam")]).await.unwrap();
    assert_eq!(value["args"], json!(["cam"]));
}

#[test]
fn test_configuration_reads_are_stable() {
    let client = InternalApiClient::new(HarnessApi::new(Duration::ZERO), &BridgeConfig::default());
    for _ in 0..3 {
        assert_eq!(client.config().admin_ui(), "http://admin.grasshopper.local");
        assert_eq!(client.config().tenant_ui(), "http://2014.cam.grasshopper.local");
        assert_eq!(client.config().wait_timeout(), Duration::from_millis(30_000));
    }
}

/// Drops every callback without calling it.
struct SilentApi;

impl InternalApi for SilentApi {
    fn call(&self, _namespace: &str, _method: &str, _args: Vec<Value>, callback: ApiCallback) {
        drop(callback);
    }
}

#[test]
fn test_dropped_callback_still_waits_for_timeout() {
    init_logging();
    let client = InternalApiClient::new(SilentApi, &config(200, 50));
    let started = Instant::now();
    let err = client.call_blocking("admin", "getTenant", vec![]).unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(
        err,
        BridgeError::Timeout {
            waited: Duration::from_millis(200)
        }
    );
}

#[test]
fn test_dropped_callback_times_out_through_invoke() {
    init_logging();
    let client = InternalApiClient::new(SilentApi, &config(200, 50));
    let (tx, rx) = channel();
    let started = Instant::now();
    client
        .invoke("admin", "getTenant", vec![], move |result| {
            tx.send((result, started.elapsed())).unwrap();
        })
        .join()
        .expect("The callback thread has panicked");
    let (result, elapsed) = rx.recv().unwrap();
    assert!(elapsed >= Duration::from_millis(200));
    assert!(matches!(result, Err(err) if err.is_timeout()));
    assert!(rx.try_recv().is_err());
}
