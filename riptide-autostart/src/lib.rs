//! §4.7 Autostart Coordinator — the WebSocket endpoint a "start project"
//! status page connects to, mounted by `riptide-server` at the fixed path
//! `/___riptide_proxy_ws`. Kept as its own crate (rather than folded into
//! `riptide-proxy`) because it carries its own process-wide state (the
//! subscriber set and the single-flight `running` flag) and its own
//! `axum` state type, avoiding a dependency from the reverse-proxy crate
//! back onto the coordinator.

pub mod coordinator;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use dashmap::DashMap;
use riptide_observability::metrics::MetricsCollector;
use riptide_store::RuntimeStorage;
use tokio::sync::mpsc::UnboundedSender;

/// Process-wide state for the autostart coordinator.
///
/// `running` is deliberately a single flag, not one per project (spec.md
/// §5: "the `running` flag implements a per-process single-start
/// guarantee (weaker than per-project: even concurrent starts of
/// different projects serialize)"). This is carried over unchanged.
#[derive(Clone)]
pub struct AutostartState {
    pub storage: RuntimeStorage,
    /// CIDR allowlist gating the `start` action; `None` permits everyone.
    pub restrict: Option<Vec<String>>,
    pub metrics: Arc<MetricsCollector>,
    subscribers: Arc<DashMap<String, Vec<(u64, UnboundedSender<String>)>>>,
    next_subscriber_id: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl AutostartState {
    pub fn new(storage: RuntimeStorage, restrict: Option<Vec<String>>) -> Self {
        Self::with_metrics(
            storage,
            restrict,
            Arc::new(MetricsCollector::new().expect("failed to construct metrics collector")),
        )
    }

    pub fn with_metrics(
        storage: RuntimeStorage,
        restrict: Option<Vec<String>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            storage,
            restrict,
            metrics,
            subscribers: Arc::new(DashMap::new()),
            next_subscriber_id: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}
