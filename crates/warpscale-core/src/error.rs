//! Error types shared across warpscale crates.

use thiserror::Error;

/// Result type alias for collaborator (fleet/metrics) calls.
pub type FleetResult<T> = Result<T, FleetError>;

/// Errors surfaced by the fleet-management or metrics system.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("api error: {0}")]
    Api(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("store error: {0}")]
    Store(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    Duration { field: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}
