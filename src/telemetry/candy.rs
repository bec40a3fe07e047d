//! Eat span helpers.
//!
//! Provides span creation and flavour-transition recording for candies
//! flowing through the worker pool.

use tracing::Span;

use crate::model::{CandyId, Flavour, FlavourState};

/// Start a span covering one eat call.
///
/// The `candy.outcome` field is declared empty and filled in once the eater
/// returns.
pub fn start_eat_span(worker: usize, flavour: Flavour, id: CandyId) -> Span {
    tracing::info_span!(
        "candy.eat",
        "candy.worker" = worker,
        "candy.flavour" = %flavour,
        "candy.id" = %id,
        "candy.outcome" = tracing::field::Empty,
    )
}

/// Record a flavour state transition as a `debug` event on the given span.
pub fn record_flavour_transition(
    span: &Span,
    flavour: Flavour,
    from: FlavourState,
    to: FlavourState,
) {
    span.in_scope(|| {
        tracing::debug!(%flavour, %from, %to, "flavour_transition");
    });
}
