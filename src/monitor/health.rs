use chrono::{DateTime, Utc};

/// Outcome of the most recent health probe for a network. Starts at
/// `Unknown` so a network is not reported unreachable before its first
/// probe has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeOutcome {
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

/// Per-network health record. Written only by that network's own poller;
/// the probe tick owns `probe`/`consecutive_failures`, the scrape tick owns
/// `last_success`. The supervisor only reads it.
#[derive(Debug, Clone, Default)]
pub struct NetworkHealthState {
    pub probe: ProbeOutcome,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
}

impl NetworkHealthState {
    pub fn record_probe_success(&mut self) {
        self.probe = ProbeOutcome::Reachable;
        self.consecutive_failures = 0;
    }

    /// Returns the updated failure streak.
    pub fn record_probe_failure(&mut self) -> u32 {
        self.probe = ProbeOutcome::Unreachable;
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    pub fn record_scrape_success(&mut self, at: DateTime<Utc>) {
        self.last_success = Some(at);
    }
}

/// Process-wide health, derived from the per-network records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalHealth {
    pub healthy: bool,
    pub last_successful_scrape: Option<DateTime<Utc>>,
}

impl GlobalHealth {
    /// Healthy iff every network's latest probe succeeded and at least one
    /// scrape has ever succeeded anywhere.
    pub fn aggregate<'a, I>(states: I) -> Self
    where
        I: IntoIterator<Item = &'a NetworkHealthState>,
    {
        let mut all_reachable = true;
        let mut any_network = false;
        let mut last_successful_scrape: Option<DateTime<Utc>> = None;

        for state in states {
            any_network = true;
            if state.probe != ProbeOutcome::Reachable {
                all_reachable = false;
            }
            if let Some(at) = state.last_success {
                last_successful_scrape =
                    Some(last_successful_scrape.map_or(at, |current| current.max(at)));
            }
        }

        GlobalHealth {
            healthy: any_network && all_reachable && last_successful_scrape.is_some(),
            last_successful_scrape,
        }
    }
}
