// Shared test doubles: a scriptable RPC client and a capturing metrics sink.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, U256};
use evm_balance_exporter::config::{NetworkTarget, TokenDefinition, WatchedAddress};
use evm_balance_exporter::metrics::{BalanceLabels, MetricsSink};
use evm_balance_exporter::rpc::{BalanceReader, HealthProbe, RpcError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// RPC double whose behavior is scripted per test.
pub struct ScriptedRpc {
    balances: Mutex<HashMap<(Address, Address), U256>>,
    fail_balances: AtomicBool,
    probe_ok: AtomicBool,
    delay: Mutex<Option<Duration>>,
    blocking_delay: Mutex<Option<Duration>>,
}

impl Default for ScriptedRpc {
    fn default() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            fail_balances: AtomicBool::new(false),
            probe_ok: AtomicBool::new(true),
            delay: Mutex::new(None),
            blocking_delay: Mutex::new(None),
        }
    }
}

impl ScriptedRpc {
    pub fn set_balance(&self, contract: Address, account: Address, raw: U256) {
        self.balances
            .lock()
            .unwrap()
            .insert((contract, account), raw);
    }

    pub fn fail_all_balances(&self, fail: bool) {
        self.fail_balances.store(fail, Ordering::SeqCst);
    }

    pub fn set_probe_ok(&self, ok: bool) {
        self.probe_ok.store(ok, Ordering::SeqCst);
    }

    /// Make every call stall first, to simulate a slow endpoint.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Make balance reads block the thread instead of yielding, to simulate
    /// work that cancellation cannot interrupt. Requires a multi-threaded
    /// test runtime.
    pub fn set_blocking_balance_delay(&self, delay: Duration) {
        *self.blocking_delay.lock().unwrap() = Some(delay);
    }

    async fn stall(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl BalanceReader for ScriptedRpc {
    async fn read_balance(&self, contract: Address, account: Address) -> Result<U256, RpcError> {
        let blocking = *self.blocking_delay.lock().unwrap();
        if let Some(delay) = blocking {
            std::thread::sleep(delay);
        }
        self.stall().await;
        if self.fail_balances.load(Ordering::SeqCst) {
            return Err(RpcError::Transport("scripted balance failure".to_string()));
        }
        self.balances
            .lock()
            .unwrap()
            .get(&(contract, account))
            .copied()
            .ok_or_else(|| RpcError::Protocol("no scripted balance".to_string()))
    }
}

#[async_trait]
impl HealthProbe for ScriptedRpc {
    async fn probe(&self) -> Result<u64, RpcError> {
        self.stall().await;
        if self.probe_ok.load(Ordering::SeqCst) {
            Ok(1)
        } else {
            Err(RpcError::Transport("scripted probe failure".to_string()))
        }
    }
}

/// Sink double that records the latest value per series.
#[derive(Default)]
pub struct RecordingSink {
    pub balances: Mutex<HashMap<(String, String, String), f64>>,
    pub rpc_health: Mutex<HashMap<String, f64>>,
    pub scrape_failures: Mutex<HashMap<String, u64>>,
    pub last_scrape: Mutex<Option<f64>>,
    pub exporter_health: Mutex<Option<f64>>,
}

impl RecordingSink {
    pub fn balance(&self, network: &str, token: &str, alias: &str) -> Option<f64> {
        self.balances
            .lock()
            .unwrap()
            .get(&(network.to_string(), token.to_string(), alias.to_string()))
            .copied()
    }

    pub fn rpc_health(&self, network: &str) -> Option<f64> {
        self.rpc_health.lock().unwrap().get(network).copied()
    }

    pub fn scrape_failures(&self, network: &str) -> u64 {
        self.scrape_failures
            .lock()
            .unwrap()
            .get(network)
            .copied()
            .unwrap_or(0)
    }
}

impl MetricsSink for RecordingSink {
    fn set_token_balance(&self, labels: &BalanceLabels<'_>, value: f64) {
        self.balances.lock().unwrap().insert(
            (
                labels.network.to_string(),
                labels.token.to_string(),
                labels.alias.to_string(),
            ),
            value,
        );
    }

    fn set_rpc_health(&self, network: &str, reachable: bool) {
        self.rpc_health
            .lock()
            .unwrap()
            .insert(network.to_string(), if reachable { 1.0 } else { 0.0 });
    }

    fn inc_scrape_failures(&self, network: &str) {
        *self
            .scrape_failures
            .lock()
            .unwrap()
            .entry(network.to_string())
            .or_insert(0) += 1;
    }

    fn set_last_successful_scrape(&self, unix_seconds: f64) {
        *self.last_scrape.lock().unwrap() = Some(unix_seconds);
    }

    fn set_exporter_health(&self, healthy: bool) {
        *self.exporter_health.lock().unwrap() = Some(if healthy { 1.0 } else { 0.0 });
    }
}

pub fn addr(byte: u8) -> Address {
    Address::from([byte; 20])
}

/// A single-token, single-address target with short intervals for tests.
pub fn target(name: &str, token_contract: Address, account: Address) -> NetworkTarget {
    NetworkTarget {
        name: name.to_string(),
        rpc_url: format!("https://{name}.example.com"),
        scrape_interval: Duration::from_millis(50),
        health_check_interval: Duration::from_millis(50),
        max_concurrent_requests: 4,
        tokens: vec![TokenDefinition {
            symbol: "USDC".to_string(),
            contract: token_contract,
            contract_address: format!("{token_contract:#x}"),
            decimals: 6,
        }],
        addresses: vec![WatchedAddress {
            alias: "bridge_eth".to_string(),
            account,
            address: format!("{account:#x}"),
        }],
    }
}
