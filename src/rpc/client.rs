use async_trait::async_trait;
use ethers::contract::{abigen, ContractError};
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

abigen!(
    Erc20Token,
    r#"[
        function balanceOf(address account) external view returns (uint256)
    ]"#
);

/// Upper bound on any single RPC call. A request that exceeds this is
/// treated exactly like a failed request.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the RPC layer. Transport and protocol failures are handled
/// identically by callers; the split only matters for log output.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("protocol failure: {0}")]
    Protocol(String),
}

impl RpcError {
    fn from_provider(err: ProviderError) -> Self {
        match err {
            ProviderError::SerdeJson(e) => RpcError::Protocol(e.to_string()),
            other => RpcError::Transport(other.to_string()),
        }
    }

    fn from_contract(err: ContractError<Provider<Http>>) -> Self {
        match err {
            ContractError::MiddlewareError { e } => Self::from_provider(e),
            ContractError::ProviderError { e } => Self::from_provider(e),
            other => RpcError::Protocol(other.to_string()),
        }
    }

    fn timed_out(after: Duration) -> Self {
        RpcError::Transport(format!("request timed out after {after:?}"))
    }
}

/// Reads an ERC-20-style balance of one account for one token contract.
#[async_trait]
pub trait BalanceReader: Send + Sync {
    async fn read_balance(&self, contract: Address, account: Address) -> Result<U256, RpcError>;
}

/// Lightweight liveness check of an RPC endpoint. Returns the current block
/// number on success.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<u64, RpcError>;
}

/// Production implementation of both capabilities over an ethers HTTP
/// provider. One instance per network.
pub struct EvmRpcClient {
    provider: Arc<Provider<Http>>,
    timeout: Duration,
}

impl EvmRpcClient {
    pub fn new(rpc_url: &str) -> Result<Self, RpcError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| RpcError::Transport(format!("failed to create provider: {e}")))?;
        Ok(Self {
            provider: Arc::new(provider),
            timeout: DEFAULT_RPC_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl BalanceReader for EvmRpcClient {
    async fn read_balance(&self, contract: Address, account: Address) -> Result<U256, RpcError> {
        let token = Erc20Token::new(contract, self.provider.clone());
        match timeout(self.timeout, token.balance_of(account).call()).await {
            Ok(Ok(balance)) => Ok(balance),
            Ok(Err(e)) => Err(RpcError::from_contract(e)),
            Err(_) => Err(RpcError::timed_out(self.timeout)),
        }
    }
}

#[async_trait]
impl HealthProbe for EvmRpcClient {
    async fn probe(&self) -> Result<u64, RpcError> {
        match timeout(self.timeout, self.provider.get_block_number()).await {
            Ok(Ok(block)) => Ok(block.as_u64()),
            Ok(Err(e)) => Err(RpcError::from_provider(e)),
            Err(_) => Err(RpcError::timed_out(self.timeout)),
        }
    }
}
