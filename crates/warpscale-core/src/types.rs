//! Domain types for the fleet and metrics systems.
//!
//! These mirror what the external fleet-management and metrics APIs
//! report. The engine never mutates them; every run re-reads a fresh
//! snapshot. All types are serializable so the embedded store can keep
//! them as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Namespace of the group-level metrics published by the fleet system.
pub const GROUP_METRICS_NAMESPACE: &str = "AutoScaling";

/// Dimension name that scopes group-level metrics to one group.
pub const GROUP_DIMENSION: &str = "AutoScalingGroupName";

/// Desired capacity of a group over time.
pub const GROUP_DESIRED_CAPACITY: &str = "GroupDesiredCapacity";

/// Number of in-service instances of a group over time.
pub const GROUP_IN_SERVICE_INSTANCES: &str = "GroupInServiceInstances";

// ── Group ─────────────────────────────────────────────────────────

/// An elastically-sized set of instances managed as a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub name: String,
    pub desired_capacity: u32,
    pub min_size: u32,
    pub max_size: u32,
    /// Fleet tag, used when groups are selected by fleet instead of name.
    #[serde(default)]
    pub fleet: Option<String>,
}

// ── Scaling policy ────────────────────────────────────────────────

/// How a policy's `adjustment` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentType {
    ChangeInCapacity,
    ExactCapacity,
    PercentChangeInCapacity,
    #[serde(other)]
    Other,
}

/// A named, signed capacity adjustment bound to one or more alarms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingPolicy {
    pub name: String,
    /// Name of the group this policy belongs to.
    pub group: String,
    /// Positive scales up, negative scales down.
    pub adjustment: i32,
    pub adjustment_type: AdjustmentType,
    /// Names of the alarms bound to this policy.
    #[serde(default)]
    pub alarms: Vec<String>,
}

impl ScalingPolicy {
    pub fn is_scale_up(&self) -> bool {
        self.adjustment > 0
    }

    pub fn is_scale_down(&self) -> bool {
        self.adjustment < 0
    }
}

// ── Alarm ─────────────────────────────────────────────────────────

/// Provider-evaluated state of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    Alarm,
    Ok,
    InsufficientData,
}

/// How an alarm compares its metric against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    GreaterThanOrEqualToThreshold,
    GreaterThanThreshold,
    LessThanThreshold,
    LessThanOrEqualToThreshold,
    #[serde(other)]
    Unrecognized,
}

impl ComparisonOperator {
    /// Apply the operator to `value` against `threshold`.
    ///
    /// Unrecognized operators and NaN values never match.
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThanOrEqualToThreshold => value >= threshold,
            Self::GreaterThanThreshold => value > threshold,
            Self::LessThanThreshold => value < threshold,
            Self::LessThanOrEqualToThreshold => value <= threshold,
            Self::Unrecognized => false,
        }
    }
}

/// Aggregation applied to raw samples within one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Sum,
    Minimum,
    Maximum,
    SampleCount,
}

/// A provider-evaluated condition over a metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alarm {
    pub name: String,
    /// Provider-native actions flag. When true the provider triggers the
    /// bound policies itself.
    pub enabled: bool,
    pub state: AlarmState,
    pub comparison_operator: ComparisonOperator,
    pub threshold: f64,
    pub metric: Metric,
    /// Native evaluation period in seconds.
    pub period: u64,
    pub evaluation_periods: u32,
    pub statistic: Statistic,
}

// ── Metrics ───────────────────────────────────────────────────────

/// Identity of a time series: namespace, name, and dimension filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Metric {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
}

impl Metric {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            dimensions: BTreeMap::new(),
        }
    }

    /// Add a dimension filter.
    pub fn with_dimension(mut self, name: &str, value: &str) -> Self {
        self.dimensions.insert(name.to_string(), value.to_string());
        self
    }

    /// The group's desired-capacity series.
    pub fn group_desired_capacity(group: &str) -> Self {
        Self::new(GROUP_METRICS_NAMESPACE, GROUP_DESIRED_CAPACITY)
            .with_dimension(GROUP_DIMENSION, group)
    }

    /// The group's in-service instance count series.
    pub fn group_in_service_instances(group: &str) -> Self {
        Self::new(GROUP_METRICS_NAMESPACE, GROUP_IN_SERVICE_INSTANCES)
            .with_dimension(GROUP_DIMENSION, group)
    }

    /// Stable string key: `{namespace}/{name}{dim=value,...}`.
    ///
    /// Dimensions are ordered, so equal metrics always share a key.
    pub fn series_key(&self) -> String {
        let dims: Vec<String> = self
            .dimensions
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{}/{}{{{}}}", self.namespace, self.name, dims.join(","))
    }
}

/// One aggregated point of a time series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Datapoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

// ── Instance ──────────────────────────────────────────────────────

/// Lifecycle status of a fleet instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Stopping,
    Terminated,
}

/// A compute instance belonging to a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub id: String,
    /// Name of the owning group.
    pub group: String,
    pub status: InstanceStatus,
    /// Unix timestamp when the instance was launched.
    pub launch_time: Timestamp,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }
}
