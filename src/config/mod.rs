//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Nothing here is
//! required: every variable has a default.

pub mod service;

pub use service::{MAX_EVENT_CAPACITY, ServiceConfig};

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::reorder::ReorderPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// `OTEL_ENDPOINT`: OTLP collector; stdout-only telemetry when unset.
    pub otel_endpoint: Option<String>,
    /// `LOG_LEVEL`: fallback filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// `CANDY_EATERS`: number of eaters (and so workers) to start. At least 1.
    pub eaters: usize,
    /// `CANDY_REORDER` and `CANDY_EVENT_CAPACITY`.
    pub service: ServiceConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let eaters = parsed_var("CANDY_EATERS", 4usize)?;
        if eaters == 0 {
            return Err(Error::Config("CANDY_EATERS must be at least 1".to_string()));
        }

        let defaults = ServiceConfig::default();
        let service = ServiceConfig {
            reorder: parsed_var::<ReorderPolicy>("CANDY_REORDER", defaults.reorder)?,
            event_capacity: parsed_var("CANDY_EVENT_CAPACITY", defaults.event_capacity)?,
        };
        service.validate()?;

        Ok(Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            eaters,
            service,
        })
    }
}

fn parsed_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {name}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}
