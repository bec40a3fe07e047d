//! Structured events emitted by the service as candies move through it.
//!
//! Subscribers can build dashboards or audit trails from them. Delivery is
//! best-effort: the pipeline never waits for a subscriber, and one that falls
//! behind loses the oldest events.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::MAX_EVENT_CAPACITY;
use crate::model::{CandyId, Flavour, Outcome};

/// A structured event emitted by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    CandySubmitted {
        id: CandyId,
        flavour: Flavour,
    },
    CandyAdmitted {
        id: CandyId,
        flavour: Flavour,
    },
    CandyEating {
        id: CandyId,
        flavour: Flavour,
        worker: usize,
    },
    CandyEaten {
        id: CandyId,
        flavour: Flavour,
        worker: usize,
        outcome: Outcome,
    },
    FlavourReleased {
        flavour: Flavour,
    },
}

/// Stamps events with a sequence number and fans them out.
#[derive(Debug)]
pub(crate) struct EventBus {
    // seq and send under one lock so seq order is channel order
    inner: Mutex<(u64, broadcast::Sender<Event>)>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.clamp(1, MAX_EVENT_CAPACITY));
        Self {
            inner: Mutex::new((0, tx)),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.lock().1.subscribe()
    }

    pub(crate) fn emit(&self, kind: EventKind) {
        let mut inner = self.lock();
        inner.0 += 1;
        let event = Event {
            seq: inner.0,
            timestamp: Utc::now(),
            kind,
        };
        // No subscribers is fine.
        let _ = inner.1.send(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, (u64, broadcast::Sender<Event>)> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_carry_increasing_seq() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(EventKind::FlavourReleased { flavour: Flavour(1) });
        bus.emit(EventKind::FlavourReleased { flavour: Flavour(2) });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(
            second.kind,
            EventKind::FlavourReleased { flavour: Flavour(2) }
        );
    }

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        let bus = EventBus::new(1);
        bus.emit(EventKind::FlavourReleased { flavour: Flavour(0) });
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event {
            seq: 3,
            timestamp: Utc::now(),
            kind: EventKind::CandyEating {
                id: CandyId::new(),
                flavour: Flavour(-2),
                worker: 1,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["type"], "candy_eating");
        assert_eq!(json["kind"]["flavour"], -2);
        assert_eq!(json["kind"]["worker"], 1);
    }
}
