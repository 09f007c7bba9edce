pub mod sink;

pub use sink::{scale_balance, BalanceLabels, MetricsSink, PrometheusSink};
