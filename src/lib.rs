pub mod api;
pub mod config;
pub mod metrics;
pub mod monitor;
pub mod rpc;

pub use config::{ConfigError, ExporterConfig, NetworkTarget, TokenDefinition, WatchedAddress};
pub use metrics::{BalanceLabels, MetricsSink, PrometheusSink};
pub use monitor::{ExporterSupervisor, GlobalHealth, NetworkHealthState, NetworkPoller, ProbeOutcome};
pub use rpc::{BalanceReader, EvmRpcClient, HealthProbe, RpcError};
