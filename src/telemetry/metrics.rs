//! Metric instrument factories for candy-service.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider these are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("candy-service")
}

/// Counter: candies handed to `submit`.
pub fn candies_submitted() -> Counter<u64> {
    meter()
        .u64_counter("candy.submitted")
        .with_description("Number of candies submitted")
        .build()
}

/// Counter: candies admitted past the flavour gate.
pub fn candies_admitted() -> Counter<u64> {
    meter()
        .u64_counter("candy.admitted")
        .with_description("Number of candies admitted to the ready queue")
        .build()
}

/// Counter: finished eat calls.
/// Labels: `result` ("ok" | "failed").
pub fn candies_eaten() -> Counter<u64> {
    meter()
        .u64_counter("candy.eaten")
        .with_description("Number of candies eaten")
        .build()
}

/// Counter: completion signals that returned a flavour to idle.
pub fn flavours_released() -> Counter<u64> {
    meter()
        .u64_counter("candy.released")
        .with_description("Number of flavour releases")
        .build()
}

/// Histogram: eat call duration in milliseconds.
/// Labels: `result`.
pub fn eat_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("candy.eat.duration_ms")
        .with_description("Eat duration in milliseconds")
        .with_unit("ms")
        .build()
}
