//! warpscale.toml configuration parser.
//!
//! The file form keeps durations as strings ("10m", "1w"). `resolve()`
//! validates it and produces the typed `EngineConfig` the evaluators
//! consume, with every duration converted to seconds.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::duration::parse_duration_secs;
use crate::error::ConfigError;

/// Default width of the window used to compare current and past load.
pub const DEFAULT_VALID_PERIOD_SECS: u64 = 10 * 60;

/// Default metric name for variable-threshold scale-down.
pub const DEFAULT_THRESHOLD_METRIC: &str = "CPUUtilization";

/// Largest allowed `max_sunk_cost` (one billing hour).
pub const MAX_SUNK_COST_LIMIT_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpscaleConfig {
    pub dry_run: bool,
    pub groups: GroupsConfig,
    pub predictive_scaling: PredictiveScalingConfig,
    pub flexible_down_scaling: FlexibleDownScalingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    pub names: Vec<String>,
    pub fleet: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictiveScalingConfig {
    pub enabled: bool,
    pub lookback_windows: Vec<String>,
    pub lookahead_window: Option<String>,
    pub valid_threshold: Option<f64>,
    pub valid_period: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlexibleDownScalingConfig {
    pub enabled: bool,
    pub up_down_cooldown: Option<String>,
    pub down_down_cooldown: Option<String>,
    pub max_sunk_cost: Option<String>,
    pub variable_thresholds: bool,
    pub threshold_metric: Option<String>,
    pub n_low: Option<u32>,
    pub n_high: Option<u32>,
    pub m: Option<f64>,
    pub g_low: Option<f64>,
    pub g_high: Option<f64>,
}

// ── Resolved config ───────────────────────────────────────────────

/// Which groups a run evaluates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSelector {
    Names(Vec<String>),
    Fleet(String),
}

/// Validated engine configuration, durations in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub dry_run: bool,
    pub groups: GroupSelector,
    /// `None` when predictive scaling is disabled.
    pub predictive: Option<PredictiveConfig>,
    /// `None` when flexible down scaling is disabled.
    pub flexible_down: Option<FlexibleDownConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictiveConfig {
    pub lookback_windows: Vec<u64>,
    pub lookahead_window: Option<u64>,
    pub valid_threshold: Option<f64>,
    pub valid_period: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlexibleDownConfig {
    pub up_down_cooldown: Option<u64>,
    pub down_down_cooldown: Option<u64>,
    pub max_sunk_cost: Option<u64>,
    /// `None` means fixed thresholds (alarm state only).
    pub variable_thresholds: Option<VariableThresholdConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableThresholdConfig {
    /// Metric name of the alarm evaluated against the variable threshold.
    pub metric_name: String,
    /// Low anchor group size; defaults to `min_size + 1`.
    pub n_low: Option<u32>,
    /// High anchor group size; defaults to `max_size`.
    pub n_high: Option<u32>,
    /// Nominal max utilization; defaults to the alarm's threshold.
    pub m: Option<f64>,
    pub g_low: f64,
    pub g_high: f64,
}

impl WarpscaleConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate and convert into an `EngineConfig`.
    pub fn resolve(&self) -> Result<EngineConfig, ConfigError> {
        let groups = match (self.groups.names.is_empty(), &self.groups.fleet) {
            (true, None) => {
                return Err(ConfigError::Invalid("no groups were specified".into()));
            }
            (false, Some(_)) => {
                return Err(ConfigError::Invalid(
                    "groups.names and groups.fleet are mutually exclusive".into(),
                ));
            }
            (false, None) => GroupSelector::Names(self.groups.names.clone()),
            (true, Some(fleet)) => GroupSelector::Fleet(fleet.clone()),
        };

        let predictive = if self.predictive_scaling.enabled {
            Some(self.predictive_scaling.resolve()?)
        } else {
            None
        };

        let flexible_down = if self.flexible_down_scaling.enabled {
            Some(self.flexible_down_scaling.resolve()?)
        } else {
            None
        };

        Ok(EngineConfig {
            dry_run: self.dry_run,
            groups,
            predictive,
            flexible_down,
        })
    }
}

impl PredictiveScalingConfig {
    fn resolve(&self) -> Result<PredictiveConfig, ConfigError> {
        let lookback_windows = self
            .lookback_windows
            .iter()
            .map(|w| duration("predictive_scaling.lookback_windows", w))
            .collect::<Result<Vec<_>, _>>()?;
        let lookahead_window =
            optional_duration("predictive_scaling.lookahead_window", &self.lookahead_window)?;

        if lookback_windows.is_empty() || lookahead_window.is_none() {
            return Err(ConfigError::Invalid(
                "predictive scaling needs lookback_windows and a lookahead_window".into(),
            ));
        }

        if let Some(t) = self.valid_threshold
            && !(t > 0.0 && t < 1.0)
        {
            return Err(ConfigError::Invalid(format!(
                "predictive_scaling.valid_threshold must be between 0 and 1 (got {t})"
            )));
        }

        let valid_period = optional_duration("predictive_scaling.valid_period", &self.valid_period)?
            .unwrap_or(DEFAULT_VALID_PERIOD_SECS);

        Ok(PredictiveConfig {
            lookback_windows,
            lookahead_window,
            valid_threshold: self.valid_threshold,
            valid_period,
        })
    }
}

impl FlexibleDownScalingConfig {
    fn resolve(&self) -> Result<FlexibleDownConfig, ConfigError> {
        let up_down_cooldown =
            optional_duration("flexible_down_scaling.up_down_cooldown", &self.up_down_cooldown)?;
        let down_down_cooldown = optional_duration(
            "flexible_down_scaling.down_down_cooldown",
            &self.down_down_cooldown,
        )?;
        if up_down_cooldown.is_none() || down_down_cooldown.is_none() {
            return Err(ConfigError::Invalid(
                "flexible down scaling needs both up_down_cooldown and down_down_cooldown".into(),
            ));
        }

        let max_sunk_cost =
            optional_duration("flexible_down_scaling.max_sunk_cost", &self.max_sunk_cost)?;
        if let Some(secs) = max_sunk_cost
            && secs > MAX_SUNK_COST_LIMIT_SECS
        {
            return Err(ConfigError::Invalid(
                "flexible_down_scaling.max_sunk_cost must be at most 1 hour".into(),
            ));
        }

        let variable_thresholds = if self.variable_thresholds {
            let (Some(g_low), Some(g_high)) = (self.g_low, self.g_high) else {
                return Err(ConfigError::Invalid(
                    "variable thresholds need g_low and g_high".into(),
                ));
            };
            Some(VariableThresholdConfig {
                metric_name: self
                    .threshold_metric
                    .clone()
                    .unwrap_or_else(|| DEFAULT_THRESHOLD_METRIC.to_string()),
                n_low: self.n_low,
                n_high: self.n_high,
                m: self.m,
                g_low,
                g_high,
            })
        } else {
            None
        };

        Ok(FlexibleDownConfig {
            up_down_cooldown,
            down_down_cooldown,
            max_sunk_cost,
            variable_thresholds,
        })
    }
}

fn duration(field: &'static str, value: &str) -> Result<u64, ConfigError> {
    parse_duration_secs(value).ok_or_else(|| ConfigError::Duration {
        field,
        value: value.to_string(),
    })
}

fn optional_duration(field: &'static str, value: &Option<String>) -> Result<Option<u64>, ConfigError> {
    value.as_deref().map(|v| duration(field, v)).transpose()
}
