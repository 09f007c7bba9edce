pub mod client;

pub use client::{BalanceReader, EvmRpcClient, HealthProbe, RpcError, DEFAULT_RPC_TIMEOUT};
