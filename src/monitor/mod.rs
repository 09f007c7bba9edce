pub mod health;
pub mod poller;
pub mod supervisor;

pub use health::{GlobalHealth, NetworkHealthState, ProbeOutcome};
pub use poller::NetworkPoller;
pub use supervisor::{ExporterSupervisor, SHUTDOWN_GRACE};
