//! Signal debouncing
//!
//! One gate per instrument. After a signal is emitted the gate stays
//! closed for the configured cooldown, suppressing repeat alerts while
//! the same market condition keeps scoring above threshold on every
//! poll cycle.
//!
//! Checking and recording are separate steps: the worker asks the gate
//! first, and records the emission only after the sink accepted the
//! alert. A failed delivery therefore does not consume the cooldown.

use tracing::debug;

#[derive(Debug)]
pub struct SignalGate {
    cooldown_secs: u64,
    last_emitted: Option<u64>,
}

impl SignalGate {
    pub fn new(cooldown_secs: u64) -> Self {
        Self {
            cooldown_secs,
            last_emitted: None,
        }
    }

    /// Whether an emission at `now` is allowed. Strictly more than the
    /// cooldown must have elapsed; at exactly the cooldown the gate is
    /// still closed. Never mutates state.
    pub fn allows(&self, now: u64) -> bool {
        match self.last_emitted {
            None => true,
            Some(last) => now.saturating_sub(last) > self.cooldown_secs,
        }
    }

    /// Record a successful emission at `now`.
    pub fn record(&mut self, now: u64) {
        debug!(now, cooldown_secs = self.cooldown_secs, "signal gate armed");
        self.last_emitted = Some(now);
    }

    pub fn last_emitted(&self) -> Option<u64> {
        self.last_emitted
    }
}
