//! Error types for candy-service.

use thiserror::Error;

use crate::model::{Flavour, FlavourState};

#[derive(Debug, Error)]
pub enum Error {
    #[error("a candy service needs at least one eater")]
    NoEaters,

    #[error("invalid flavour transition for {flavour}: {from} -> {to}")]
    InvalidTransition {
        flavour: Flavour,
        from: FlavourState,
        to: FlavourState,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
