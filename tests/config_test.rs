use candy_service::config::{Config, MAX_EVENT_CAPACITY};
use candy_service::{Error, ReorderPolicy};

// Environment variables are process-global; keep every case in one test so
// they cannot race each other.
#[test]
fn config_from_env() {
    let vars = [
        "CANDY_EATERS",
        "CANDY_REORDER",
        "CANDY_EVENT_CAPACITY",
        "LOG_LEVEL",
        "OTEL_ENDPOINT",
    ];
    let clear = || {
        for var in vars {
            unsafe { std::env::remove_var(var) };
        }
    };

    // Defaults
    clear();
    let config = Config::from_env().unwrap();
    assert_eq!(config.eaters, 4);
    assert_eq!(config.log_level, "info");
    assert!(config.otel_endpoint.is_none());
    assert_eq!(config.service.reorder, ReorderPolicy::Interleave);

    // Overrides
    unsafe {
        std::env::set_var("CANDY_EATERS", "10");
        std::env::set_var("CANDY_REORDER", "arrival");
        std::env::set_var("CANDY_EVENT_CAPACITY", "64");
        std::env::set_var("LOG_LEVEL", "debug");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.eaters, 10);
    assert_eq!(config.service.reorder, ReorderPolicy::Arrival);
    assert_eq!(config.service.event_capacity, 64);
    assert_eq!(config.log_level, "debug");

    // Zero eaters fails fast
    unsafe { std::env::set_var("CANDY_EATERS", "0") };
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    // Event capacities the broadcast channel cannot hold fail fast
    unsafe {
        std::env::set_var("CANDY_EATERS", "2");
        std::env::set_var("CANDY_EVENT_CAPACITY", usize::MAX.to_string());
    }
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));
    unsafe { std::env::set_var("CANDY_EVENT_CAPACITY", "0") };
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));
    unsafe { std::env::set_var("CANDY_EVENT_CAPACITY", MAX_EVENT_CAPACITY.to_string()) };
    assert_eq!(
        Config::from_env().unwrap().service.event_capacity,
        MAX_EVENT_CAPACITY
    );
    unsafe { std::env::remove_var("CANDY_EVENT_CAPACITY") };

    // Garbage fails fast
    unsafe { std::env::set_var("CANDY_EATERS", "lots") };
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));
    unsafe {
        std::env::set_var("CANDY_EATERS", "2");
        std::env::set_var("CANDY_REORDER", "head-of-line");
    }
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    clear();
}
