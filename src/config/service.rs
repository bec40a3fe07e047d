//! Tuning knobs for a single [`CandyService`](crate::service::CandyService).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reorder::ReorderPolicy;

/// Largest accepted `event_capacity`. Each subscriber may hold this many
/// events before lagging.
pub const MAX_EVENT_CAPACITY: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// How the pending buffer is reordered on every change.
    pub reorder: ReorderPolicy,
    /// Events buffered per subscriber before the oldest are dropped.
    pub event_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            reorder: ReorderPolicy::Interleave,
            event_capacity: 1024,
        }
    }
}

impl ServiceConfig {
    pub fn reorder(mut self, policy: ReorderPolicy) -> Self {
        self.reorder = policy;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_EVENT_CAPACITY).contains(&self.event_capacity) {
            return Err(Error::Config(format!(
                "event capacity must be between 1 and {MAX_EVENT_CAPACITY}, got {}",
                self.event_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn event_capacity_bounds() {
        let at = |capacity| ServiceConfig::default().event_capacity(capacity).validate();
        assert!(at(1).is_ok());
        assert!(at(MAX_EVENT_CAPACITY).is_ok());
        assert!(matches!(at(0), Err(Error::Config(_))));
        assert!(matches!(at(MAX_EVENT_CAPACITY + 1), Err(Error::Config(_))));
        assert!(matches!(at(usize::MAX), Err(Error::Config(_))));
    }
}
