//! warpscale-core: shared vocabulary for the warpscale decision engine.
//!
//! Holds the fleet/metrics domain types, the capability traits the
//! evaluators consume (`FleetApi`, `MetricsApi`), the `warpscale.toml`
//! config model, and small pure helpers (duration strings, ratio checks).

pub mod api;
pub mod config;
pub mod duration;
pub mod error;
pub mod ratio;
pub mod types;

pub use api::{FleetApi, MetricsApi};
pub use config::{
    EngineConfig, FlexibleDownConfig, GroupSelector, PredictiveConfig, VariableThresholdConfig,
    WarpscaleConfig,
};
pub use duration::parse_duration_secs;
pub use error::{ConfigError, FleetError, FleetResult};
pub use ratio::within_threshold;
pub use types::*;
