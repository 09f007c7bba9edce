use ethers::types::U256;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Label set for one `token_balance` series. Each tuple is owned by exactly
/// one (network, token, alias) combination, so concurrent writers never
/// contend on the same series.
pub struct BalanceLabels<'a> {
    pub network: &'a str,
    pub token: &'a str,
    pub token_address: &'a str,
    pub alias: &'a str,
    pub address: &'a str,
}

/// Write-side capability handed to every poller and the supervisor.
/// Injected rather than global so tests can capture writes.
pub trait MetricsSink: Send + Sync {
    fn set_token_balance(&self, labels: &BalanceLabels<'_>, value: f64);
    fn set_rpc_health(&self, network: &str, reachable: bool);
    fn inc_scrape_failures(&self, network: &str);
    fn set_last_successful_scrape(&self, unix_seconds: f64);
    fn set_exporter_health(&self, healthy: bool);
}

/// The real sink: a dedicated prometheus registry with the exporter's five
/// instruments.
pub struct PrometheusSink {
    registry: Registry,
    token_balance: GaugeVec,
    exporter_health: Gauge,
    last_successful_scrape: Gauge,
    scrape_failures_total: IntCounterVec,
    rpc_health: GaugeVec,
}

impl PrometheusSink {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let token_balance = GaugeVec::new(
            Opts::new("token_balance", "Token balance held by a watched address"),
            &["network", "token", "token_address", "alias", "address"],
        )?;
        let exporter_health = Gauge::new(
            "exporter_health",
            "Health status of the exporter (1 = healthy, 0 = unhealthy)",
        )?;
        let last_successful_scrape = Gauge::new(
            "exporter_last_successful_scrape_timestamp",
            "Timestamp of the last successful scrape",
        )?;
        let scrape_failures_total = IntCounterVec::new(
            Opts::new(
                "exporter_scrape_failures_total",
                "Total number of scrape failures",
            ),
            &["network"],
        )?;
        let rpc_health = GaugeVec::new(
            Opts::new(
                "exporter_rpc_health",
                "RPC endpoint health status (1 = healthy, 0 = unhealthy)",
            ),
            &["network"],
        )?;

        registry.register(Box::new(token_balance.clone()))?;
        registry.register(Box::new(exporter_health.clone()))?;
        registry.register(Box::new(last_successful_scrape.clone()))?;
        registry.register(Box::new(scrape_failures_total.clone()))?;
        registry.register(Box::new(rpc_health.clone()))?;

        Ok(Self {
            registry,
            token_balance,
            exporter_health,
            last_successful_scrape,
            scrape_failures_total,
            rpc_health,
        })
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl MetricsSink for PrometheusSink {
    fn set_token_balance(&self, labels: &BalanceLabels<'_>, value: f64) {
        self.token_balance
            .with_label_values(&[
                labels.network,
                labels.token,
                labels.token_address,
                labels.alias,
                labels.address,
            ])
            .set(value);
    }

    fn set_rpc_health(&self, network: &str, reachable: bool) {
        self.rpc_health
            .with_label_values(&[network])
            .set(if reachable { 1.0 } else { 0.0 });
    }

    fn inc_scrape_failures(&self, network: &str) {
        self.scrape_failures_total.with_label_values(&[network]).inc();
    }

    fn set_last_successful_scrape(&self, unix_seconds: f64) {
        self.last_successful_scrape.set(unix_seconds);
    }

    fn set_exporter_health(&self, healthy: bool) {
        self.exporter_health.set(if healthy { 1.0 } else { 0.0 });
    }
}

/// Scale a raw integer balance by `10^-decimals`.
///
/// The division and remainder happen on `U256` so the integer part survives
/// intact; only the final float conversion can round, which keeps balances
/// exact well past 18 decimals. Config validation caps decimals at 38, so
/// the remainder always fits `u128` and `exp10` cannot overflow.
pub fn scale_balance(raw: U256, decimals: u32) -> f64 {
    if decimals == 0 {
        return raw.to_string().parse::<f64>().unwrap_or(f64::MAX);
    }
    let divisor = U256::exp10(decimals as usize);
    let whole = (raw / divisor).to_string().parse::<f64>().unwrap_or(f64::MAX);
    // Remainder is below 10^38 < u128::MAX.
    let frac = (raw % divisor).as_u128() as f64;
    whole + frac / 10f64.powi(decimals as i32)
}
