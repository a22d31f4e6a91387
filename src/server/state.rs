use crate::config::Options;
use crate::metrics::Metrics;
use crate::mitm::Ca;
use crate::pool::{ProxyPool, Rotator};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared, cheaply cloneable state handed to every connection task: the
/// immutable proxy pool plus its rotator, the resolved runtime options, the
/// sync-mode forwarding gate, the metrics handle, and the MITM certificate
/// authority. No routing table or upstream-cluster state — this engine has
/// no concept of either.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ProxyPool>,
    pub rotator: Arc<Rotator>,
    pub options: Arc<Options>,
    pub sync_lock: Arc<Mutex<()>>,
    pub metrics: Metrics,
    pub ca: Arc<Ca>,
}

impl AppState {
    pub fn new(pool: ProxyPool, options: Options, ca: Ca, metrics: Metrics) -> Self {
        let rotator = Rotator::new(options.rotate);
        Self {
            pool: Arc::new(pool),
            rotator: Arc::new(rotator),
            options: Arc::new(options),
            sync_lock: Arc::new(Mutex::new(())),
            metrics,
            ca: Arc::new(ca),
        }
    }

    #[cfg(test)]
    pub fn for_test(pool: ProxyPool, options: Options) -> Self {
        let ca = Ca::load_or_generate(None, None).expect("generate test ca");
        Self::new(pool, options, ca, Metrics::install())
    }
}
