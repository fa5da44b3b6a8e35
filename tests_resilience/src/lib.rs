//! Resilience Test Utilities
//!
//! Shared setup for end-to-end tests that drive a real host through a
//! loopback client.
//!
//! ## Test Philosophy
//!
//! - **Nothing leaks**: aborted or failed calls leave no pending or
//!   in-flight entries behind
//! - **Errors keep their shape**: what a handler or middleware reports is
//!   what the caller sees
//! - **Registration is atomic**: a rejected namespace leaves no partial state

use npc_host::{HostConfig, NpcHost};
use npc_registry::{HandlerError, Procedure};
use npc_remote::NpcClient;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Bootstrap helper for tests
///
/// Starts a host with the default configuration and connects one client.
/// Must be called from inside a Tokio runtime.
pub fn test_bootstrap() -> (NpcHost, NpcClient) {
    test_bootstrap_with(HostConfig::default())
}

pub fn test_bootstrap_with(config: HostConfig) -> (NpcHost, NpcClient) {
    npc_logger::init_for_tests();
    let host = NpcHost::start(config).expect("failed to start host");
    let client = host.connect().expect("failed to connect client");
    (host, client)
}

/// Waits until `condition` holds, failing the test after one second
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

/// Counts how many times a handler actually ran
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Identity handler that bumps the counter
    pub fn echo(&self) -> Procedure {
        let counter = Arc::clone(&self.0);
        Procedure::from_fn(move |v: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, HandlerError>(v)
        })
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A handler that never settles on its own
///
/// Records when it starts and when its future is dropped, which is how a
/// test observes that cancellation reached the handler.
#[derive(Clone, Default)]
pub struct StuckHandler {
    started: Arc<Notify>,
    runs: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl StuckHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn procedure(&self) -> Procedure {
        let this = self.clone();
        Procedure::new(move |_v: Value| {
            let started = Arc::clone(&this.started);
            let guard = SetOnDrop(Arc::clone(&this.dropped));
            this.runs.fetch_add(1, Ordering::SeqCst);
            async move {
                let _guard = guard;
                started.notify_one();
                std::future::pending::<()>().await;
                Ok::<_, HandlerError>(Value::Null)
            }
        })
    }

    /// Resolves once the handler has started running
    pub async fn started(&self) {
        self.started.notified().await;
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn was_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}
