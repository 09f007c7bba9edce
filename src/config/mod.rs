pub mod settings;

pub use settings::{ConfigError, ExporterConfig, NetworkTarget, TokenDefinition, WatchedAddress};
