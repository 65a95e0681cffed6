//! Error types for camera placement.

use thiserror::Error;

use crate::session::Phase;

/// Result type for placement operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Errors that can occur while configuring or driving a placement session.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No camera candidates were generated for the placement space")]
    NoCandidates,

    #[error("Operation `{operation}` is not allowed in phase {phase:?}")]
    InvalidPhase { operation: &'static str, phase: Phase },

    #[error("Nothing to export")]
    EmptyExport,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl PlacementError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
