//! Integration tests for telemetry initialization and span helpers.

use candy_service::telemetry::candy::{record_flavour_transition, start_eat_span};
use candy_service::telemetry::{TelemetryConfig, init_telemetry};
use candy_service::{CandyId, Flavour, FlavourState};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; a second
    // initialization returns Err instead of panicking.
    let config = TelemetryConfig {
        service_name: "candy-test".to_string(),
        ..TelemetryConfig::default()
    };
    if let Ok(guard) = init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn bad_log_level_is_a_config_error() {
    unsafe { std::env::remove_var("RUST_LOG") };
    let config = TelemetryConfig {
        log_level: "candy=[".to_string(),
        ..TelemetryConfig::default()
    };
    assert!(matches!(
        init_telemetry(config),
        Err(candy_service::Error::Config(_))
    ));
}

#[test]
fn eat_span_creates_and_records_transition() {
    let span = start_eat_span(2, Flavour(-5), CandyId::new());
    record_flavour_transition(&span, Flavour(-5), FlavourState::InFlight, FlavourState::Idle);
    span.record("candy.outcome", "ok");
}
