use ethers::types::Address;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

const DEFAULT_HEALTH_CHECK_INTERVAL: u64 = 30;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;
/// Largest decimals value the balance-scaling arithmetic supports without
/// overflow; well past the 18 of mainstream ERC-20 tokens.
const MAX_TOKEN_DECIMALS: u32 = 38;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// One token contract to query, as configured under a network's `tokens` map.
#[derive(Debug, Clone)]
pub struct TokenDefinition {
    pub symbol: String,
    pub contract: Address,
    /// Original configured address string, used verbatim as the
    /// `token_address` metric label.
    pub contract_address: String,
    pub decimals: u32,
}

/// One account to watch, as configured under a network's `addresses` list.
#[derive(Debug, Clone)]
pub struct WatchedAddress {
    pub alias: String,
    pub account: Address,
    /// Original configured address string, used verbatim as the `address`
    /// metric label.
    pub address: String,
}

/// Fully resolved description of one network. Immutable after load.
#[derive(Debug, Clone)]
pub struct NetworkTarget {
    pub name: String,
    pub rpc_url: String,
    pub scrape_interval: Duration,
    pub health_check_interval: Duration,
    pub max_concurrent_requests: usize,
    pub tokens: Vec<TokenDefinition>,
    pub addresses: Vec<WatchedAddress>,
}

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub port: u16,
    pub networks: Vec<NetworkTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    settings: RawSettings,
    networks: BTreeMap<String, RawNetwork>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    scrape_interval: u64,
    #[serde(default = "default_health_check_interval")]
    health_check_interval: u64,
    port: u16,
    #[serde(default = "default_max_concurrent_requests")]
    max_concurrent_requests: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNetwork {
    rpc_url: String,
    tokens: BTreeMap<String, RawToken>,
    addresses: Vec<RawAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawToken {
    address: String,
    decimals: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAddress {
    alias: String,
    address: String,
}

fn default_health_check_interval() -> u64 {
    DEFAULT_HEALTH_CHECK_INTERVAL
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

impl ExporterConfig {
    /// Load and validate the configuration file. Any error here is fatal at
    /// startup, before any poller is spawned.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(contents)?;
        Self::resolve(raw)
    }

    fn resolve(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.settings.scrape_interval == 0 {
            return Err(ConfigError::Invalid(
                "settings.scrape_interval must be greater than zero".to_string(),
            ));
        }
        if raw.settings.health_check_interval == 0 {
            return Err(ConfigError::Invalid(
                "settings.health_check_interval must be greater than zero".to_string(),
            ));
        }
        if raw.settings.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "settings.max_concurrent_requests must be greater than zero".to_string(),
            ));
        }
        if raw.networks.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one network must be configured".to_string(),
            ));
        }

        let mut networks = Vec::with_capacity(raw.networks.len());
        for (name, network) in raw.networks {
            networks.push(resolve_network(&name, network, &raw.settings)?);
        }

        Ok(ExporterConfig {
            port: raw.settings.port,
            networks,
        })
    }
}

fn resolve_network(
    name: &str,
    raw: RawNetwork,
    settings: &RawSettings,
) -> Result<NetworkTarget, ConfigError> {
    let url = Url::parse(&raw.rpc_url).map_err(|e| {
        ConfigError::Invalid(format!("network {name}: invalid rpc_url {}: {e}", raw.rpc_url))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Invalid(format!(
            "network {name}: rpc_url must be http or https, got {}",
            url.scheme()
        )));
    }

    if raw.tokens.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "network {name}: no tokens configured"
        )));
    }
    if raw.addresses.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "network {name}: no addresses configured"
        )));
    }

    let mut tokens = Vec::with_capacity(raw.tokens.len());
    for (symbol, token) in raw.tokens {
        if token.decimals > MAX_TOKEN_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "network {name}: token {symbol} has {} decimals, maximum supported is {MAX_TOKEN_DECIMALS}",
                token.decimals
            )));
        }
        let contract = parse_address(&token.address).map_err(|e| {
            ConfigError::Invalid(format!(
                "network {name}: token {symbol} has invalid address {}: {e}",
                token.address
            ))
        })?;
        tokens.push(TokenDefinition {
            symbol,
            contract,
            contract_address: token.address,
            decimals: token.decimals,
        });
    }

    let mut aliases = HashSet::new();
    let mut addresses = Vec::with_capacity(raw.addresses.len());
    for entry in raw.addresses {
        if !aliases.insert(entry.alias.clone()) {
            return Err(ConfigError::Invalid(format!(
                "network {name}: duplicate address alias {}",
                entry.alias
            )));
        }
        let account = parse_address(&entry.address).map_err(|e| {
            ConfigError::Invalid(format!(
                "network {name}: address {} ({}) is invalid: {e}",
                entry.address, entry.alias
            ))
        })?;
        addresses.push(WatchedAddress {
            alias: entry.alias,
            account,
            address: entry.address,
        });
    }

    info!(
        network = name,
        tokens = tokens.len(),
        addresses = addresses.len(),
        "loaded network configuration"
    );

    Ok(NetworkTarget {
        name: name.to_string(),
        rpc_url: raw.rpc_url,
        scrape_interval: Duration::from_secs(settings.scrape_interval),
        health_check_interval: Duration::from_secs(settings.health_check_interval),
        max_concurrent_requests: settings.max_concurrent_requests,
        tokens,
        addresses,
    })
}

fn parse_address(value: &str) -> Result<Address, String> {
    value.parse::<Address>().map_err(|e| e.to_string())
}
