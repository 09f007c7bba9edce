use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::NetworkTarget;
use crate::metrics::{scale_balance, BalanceLabels, MetricsSink};
use crate::monitor::health::{NetworkHealthState, ProbeOutcome};
use crate::rpc::{BalanceReader, HealthProbe};

/// Polls one network: a balance-scrape loop and a health-probe loop on
/// independent cadences, both feeding the shared metrics sink and this
/// network's health record. Failures here never leave this network.
pub struct NetworkPoller<C> {
    target: NetworkTarget,
    client: Arc<C>,
    sink: Arc<dyn MetricsSink>,
    health: Arc<RwLock<NetworkHealthState>>,
}

impl<C> NetworkPoller<C>
where
    C: BalanceReader + HealthProbe + 'static,
{
    pub fn new(target: NetworkTarget, client: Arc<C>, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            target,
            client,
            sink,
            health: Arc::new(RwLock::new(NetworkHealthState::default())),
        }
    }

    /// Handle to this network's health record, for the supervisor to read.
    pub fn health_state(&self) -> Arc<RwLock<NetworkHealthState>> {
        self.health.clone()
    }

    pub fn network(&self) -> &str {
        &self.target.name
    }

    /// Run both loops until cancellation. The loops are joined on one task
    /// and suspend only at RPC calls, so a slow scrape never starves the
    /// probe cadence.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            network = %self.target.name,
            rpc_url = %self.target.rpc_url,
            scrape_interval = ?self.target.scrape_interval,
            health_check_interval = ?self.target.health_check_interval,
            "starting network poller"
        );

        let this = Arc::new(self);
        let scrape = {
            let this = this.clone();
            let cancel = cancel.clone();
            async move { this.scrape_loop(cancel).await }
        };
        let probe = {
            let this = this.clone();
            async move { this.probe_loop(cancel).await }
        };
        tokio::join!(scrape, probe);

        info!(network = %this.target.name, "network poller stopped");
    }

    async fn scrape_loop(&self, cancel: CancellationToken) {
        let mut ticks = interval(self.target.scrape_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticks.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.scrape_once() => {}
            }
        }
    }

    async fn probe_loop(&self, cancel: CancellationToken) {
        let mut ticks = interval(self.target.health_check_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticks.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.probe_once() => {}
            }
        }
    }

    /// One scrape tick: read every (token, address) pair concurrently,
    /// bounded by the per-network limit, then publish the results. Metrics
    /// are written only after all reads finish, so a tick is all-or-nothing
    /// to an external observer.
    pub async fn scrape_once(&self) {
        // Owned pairs, so the per-pair futures capture no borrows of self
        // and the whole tick stays Send across the spawned task.
        let pairs: Vec<_> = self
            .target
            .tokens
            .iter()
            .flat_map(|token| {
                self.target
                    .addresses
                    .iter()
                    .map(move |addr| (token.clone(), addr.clone()))
            })
            .collect();

        let results = stream::iter(pairs.into_iter().map(|(token, addr)| {
            let client = self.client.clone();
            async move {
                let result = client.read_balance(token.contract, addr.account).await;
                (token, addr, result)
            }
        }))
        .buffer_unordered(self.target.max_concurrent_requests)
        .collect::<Vec<_>>()
        .await;

        let total = results.len();
        let mut updated = 0usize;
        for (token, addr, result) in results {
            match result {
                Ok(raw) => {
                    self.sink.set_token_balance(
                        &BalanceLabels {
                            network: &self.target.name,
                            token: &token.symbol,
                            token_address: &token.contract_address,
                            alias: &addr.alias,
                            address: &addr.address,
                        },
                        scale_balance(raw, token.decimals),
                    );
                    updated += 1;
                }
                Err(e) => {
                    // Stale value stays in place; the failure is charged to
                    // this network only.
                    warn!(
                        network = %self.target.name,
                        token = %token.symbol,
                        alias = %addr.alias,
                        error = %e,
                        "balance read failed"
                    );
                }
            }
        }

        if updated == 0 {
            self.sink.inc_scrape_failures(&self.target.name);
            warn!(network = %self.target.name, pairs = total, "scrape tick failed for every pair");
        } else {
            let now = Utc::now();
            self.health.write().await.record_scrape_success(now);
            self.sink
                .set_last_successful_scrape(now.timestamp_millis() as f64 / 1000.0);
            debug!(network = %self.target.name, updated, pairs = total, "scrape tick complete");
        }
    }

    /// One health-probe tick. No retry within a tick; the next scheduled
    /// tick is the retry.
    pub async fn probe_once(&self) {
        match self.client.probe().await {
            Ok(block) => {
                let first = {
                    let mut health = self.health.write().await;
                    let first = health.probe == ProbeOutcome::Unknown;
                    health.record_probe_success();
                    first
                };
                self.sink.set_rpc_health(&self.target.name, true);
                if first {
                    info!(network = %self.target.name, block, "rpc endpoint reachable");
                } else {
                    debug!(network = %self.target.name, block, "health probe ok");
                }
            }
            Err(e) => {
                let failures = self.health.write().await.record_probe_failure();
                self.sink.set_rpc_health(&self.target.name, false);
                warn!(
                    network = %self.target.name,
                    consecutive_failures = failures,
                    error = %e,
                    "health probe failed"
                );
            }
        }
    }
}
