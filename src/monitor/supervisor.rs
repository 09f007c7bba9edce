use anyhow::Result;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ExporterConfig, NetworkTarget};
use crate::metrics::MetricsSink;
use crate::monitor::health::{GlobalHealth, NetworkHealthState};
use crate::monitor::poller::NetworkPoller;
use crate::rpc::{BalanceReader, HealthProbe};

/// How long `stop` waits for a poller before abandoning it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Owns the per-network pollers: spawns one task per configured network,
/// aggregates their health records into a process-wide status, and tears
/// everything down on shutdown.
pub struct ExporterSupervisor {
    sink: Arc<dyn MetricsSink>,
    cancel: CancellationToken,
    health_states: Vec<(String, Arc<RwLock<NetworkHealthState>>)>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ExporterSupervisor {
    /// Build one poller per configured network and launch them all. Returns
    /// once every poller is scheduled; does not wait for a first tick.
    pub fn start<C, F>(
        config: &ExporterConfig,
        sink: Arc<dyn MetricsSink>,
        make_client: F,
    ) -> Result<Self>
    where
        C: BalanceReader + HealthProbe + 'static,
        F: Fn(&NetworkTarget) -> Result<Arc<C>>,
    {
        let cancel = CancellationToken::new();
        let mut health_states = Vec::with_capacity(config.networks.len());
        let mut handles = HashMap::with_capacity(config.networks.len());

        for target in &config.networks {
            let client = make_client(target)?;
            let poller = NetworkPoller::new(target.clone(), client, sink.clone());
            health_states.push((target.name.clone(), poller.health_state()));
            handles.insert(
                target.name.clone(),
                tokio::spawn(poller.run(cancel.child_token())),
            );
        }

        info!(networks = health_states.len(), "supervisor started");
        Ok(Self {
            sink,
            cancel,
            health_states,
            handles: Mutex::new(handles),
        })
    }

    /// Cancel every poller and wait for them to quiesce under one shared
    /// grace deadline. A poller that does not stop in time is abandoned
    /// rather than blocking shutdown.
    pub async fn stop(&self) {
        info!("stopping network pollers");
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        let mut handles = self.handles.lock().await;
        let shutdowns = handles.drain().map(|(network, mut handle)| async move {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => debug!(network = %network, "poller stopped"),
                Err(_) => {
                    warn!(network = %network, "poller did not stop within grace period, aborting");
                    handle.abort();
                }
            }
        });
        join_all(shutdowns).await;
    }

    /// Recompute global health from every network's current record and
    /// refresh the derived gauges. Read-only with respect to poller state;
    /// idempotent between ticks.
    pub async fn global_health(&self) -> GlobalHealth {
        let mut snapshots = Vec::with_capacity(self.health_states.len());
        for (_, state) in &self.health_states {
            snapshots.push(state.read().await.clone());
        }

        let health = GlobalHealth::aggregate(snapshots.iter());
        self.sink.set_exporter_health(health.healthy);
        if let Some(at) = health.last_successful_scrape {
            self.sink
                .set_last_successful_scrape(at.timestamp_millis() as f64 / 1000.0);
        }
        health
    }
}
