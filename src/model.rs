//! Core data model.
//!
//! A candy is something that needs eating. The service only ever looks at its
//! flavour: two candies of the same flavour must never be eaten at once.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Flavour
// ---------------------------------------------------------------------------

/// The mutual-exclusion domain of a candy. Any integer is a valid flavour,
/// negative and very large values included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Flavour(pub i64);

impl std::fmt::Display for Flavour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl From<i64> for Flavour {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Candy
// ---------------------------------------------------------------------------

/// A unit of work handed to the service. Immutable; compared only by flavour.
pub trait Candy: Send + Sync + 'static {
    fn flavour(&self) -> Flavour;
}

/// A bare flavour tag is the simplest candy there is.
impl Candy for Flavour {
    fn flavour(&self) -> Flavour {
        *self
    }
}

/// Identifier assigned to every submitted candy, for correlating events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandyId(pub Uuid);

impl CandyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for CandyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for CandyId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Flavour state
// ---------------------------------------------------------------------------

/// Per-flavour lifecycle. A flavour is in flight from admission until the
/// completion signal for that candy has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlavourState {
    /// No candy of this flavour is queued for or inside an eater.
    Idle,
    /// Exactly one candy of this flavour is ready or being eaten.
    InFlight,
}

impl FlavourState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: FlavourState) -> bool {
        use FlavourState::*;
        matches!((self, to), (Idle, InFlight) | (InFlight, Idle))
    }
}

impl std::fmt::Display for FlavourState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlavourState::Idle => "idle",
            FlavourState::InFlight => "in_flight",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How an eat call ended. A failure is opaque: the cause is never kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub duration_ms: u64,
}

impl Outcome {
    pub fn result_label(&self) -> &'static str {
        if self.success { "ok" } else { "failed" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavour_transitions_alternate() {
        assert!(FlavourState::Idle.can_transition_to(FlavourState::InFlight));
        assert!(FlavourState::InFlight.can_transition_to(FlavourState::Idle));
        assert!(!FlavourState::Idle.can_transition_to(FlavourState::Idle));
        assert!(!FlavourState::InFlight.can_transition_to(FlavourState::InFlight));
    }

    #[test]
    fn flavours_order_numerically() {
        let mut flavours = vec![Flavour(3), Flavour(-7), Flavour(i64::MAX), Flavour(0)];
        flavours.sort();
        assert_eq!(
            flavours,
            vec![Flavour(-7), Flavour(0), Flavour(3), Flavour(i64::MAX)]
        );
        assert_eq!(Flavour(-7).to_string(), "c-7");
    }
}
