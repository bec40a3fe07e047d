//! Admission gate: holds the pending buffer and the per-flavour table, and
//! hands out the first buffered candy whose flavour is not in flight.
//!
//! The whole buffer is scanned on every attempt, not just its head, so a busy
//! flavour at the front never blocks a free flavour further back.

use std::collections::{BTreeMap, VecDeque};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Candy, Flavour, FlavourState};
use crate::reorder::ReorderPolicy;
use crate::sync::Monitor;

/// Per-flavour bookkeeping. Created the first time a flavour is seen and kept
/// for the lifetime of the gate.
#[derive(Debug, Clone, Copy)]
struct FlavourSlot {
    state: FlavourState,
    admitted: u64,
}

impl Default for FlavourSlot {
    fn default() -> Self {
        Self {
            state: FlavourState::Idle,
            admitted: 0,
        }
    }
}

#[derive(Debug)]
struct GateState<C> {
    pending: VecDeque<C>,
    flavours: BTreeMap<Flavour, FlavourSlot>,
}

impl<C: Candy> GateState<C> {
    fn is_in_flight(flavours: &BTreeMap<Flavour, FlavourSlot>, flavour: Flavour) -> bool {
        flavours
            .get(&flavour)
            .is_some_and(|slot| slot.state == FlavourState::InFlight)
    }

    fn transition(&mut self, flavour: Flavour, to: FlavourState) -> Result<()> {
        let from = self
            .flavours
            .get(&flavour)
            .map_or(FlavourState::Idle, |slot| slot.state);
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition { flavour, from, to });
        }
        let slot = self.flavours.entry(flavour).or_default();
        slot.state = to;
        if to == FlavourState::InFlight {
            slot.admitted += 1;
        }
        Ok(())
    }

    /// Remove and return the first candy whose flavour is idle, marking the
    /// flavour in flight.
    fn admit(&mut self) -> Option<C> {
        let flavours = &self.flavours;
        let index = self
            .pending
            .iter()
            .position(|candy| !Self::is_in_flight(flavours, candy.flavour()))?;
        let candy = self.pending.remove(index)?;
        let flavour = candy.flavour();
        // Checked idle by the scan above.
        let _ = self.transition(flavour, FlavourState::InFlight);
        debug!(%flavour, remaining = self.pending.len(), "candy admitted");
        Some(candy)
    }
}

/// Point-in-time view of the gate, for stats and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateSnapshot {
    /// Flavours of buffered candies, in admission-scan order.
    pub pending: Vec<Flavour>,
    /// Flavours currently in flight, ascending.
    pub in_flight: Vec<Flavour>,
    /// Number of distinct flavours ever seen.
    pub known_flavours: usize,
}

/// The pending buffer plus the in-flight table, behind one monitor.
#[derive(Debug)]
pub struct AdmissionGate<C> {
    state: Monitor<GateState<C>>,
    policy: ReorderPolicy,
}

impl<C: Candy> AdmissionGate<C> {
    pub fn new(policy: ReorderPolicy) -> Self {
        Self {
            state: Monitor::new(GateState {
                pending: VecDeque::new(),
                flavours: BTreeMap::new(),
            }),
            policy,
        }
    }

    /// Buffer a candy, reorder the buffer, and wake the admission side.
    pub fn offer(&self, candy: C) {
        let policy = self.policy;
        self.state.update(|state| {
            state.flavours.entry(candy.flavour()).or_default();
            state.pending.push_back(candy);
            policy.apply(&mut state.pending);
        });
    }

    /// Admit without waiting. `None` if nothing is admissible right now.
    #[cfg(test)]
    fn try_admit(&self) -> Option<C> {
        self.state.lock().admit()
    }

    /// Admit the next candy, suspending until one is admissible. Returns
    /// `None` only on shutdown.
    pub async fn admit_next(&self, shutdown: &CancellationToken) -> Option<C> {
        self.state.wait_for(shutdown, |state| state.admit()).await
    }

    /// Mark a flavour idle again after its candy finished, and wake the
    /// admission side.
    pub fn release(&self, flavour: Flavour) -> Result<()> {
        let released = self
            .state
            .update(|state| state.transition(flavour, FlavourState::Idle));
        if released.is_ok() {
            debug!(%flavour, "flavour released");
        }
        released
    }

    /// Current state of a flavour. Unknown flavours are idle.
    pub fn flavour_state(&self, flavour: Flavour) -> FlavourState {
        self.state
            .lock()
            .flavours
            .get(&flavour)
            .map_or(FlavourState::Idle, |slot| slot.state)
    }

    /// How many candies of `flavour` have been admitted so far.
    #[cfg(test)]
    fn admitted_count(&self, flavour: Flavour) -> u64 {
        self.state
            .lock()
            .flavours
            .get(&flavour)
            .map_or(0, |slot| slot.admitted)
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.state.lock();
        GateSnapshot {
            pending: state.pending.iter().map(Candy::flavour).collect(),
            in_flight: state
                .flavours
                .iter()
                .filter(|(_, slot)| slot.state == FlavourState::InFlight)
                .map(|(flavour, _)| *flavour)
                .collect(),
            known_flavours: state.flavours.len(),
        }
    }
}
