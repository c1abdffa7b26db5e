//! Capability interfaces for the external fleet and metrics systems.
//!
//! The evaluators only ever talk to these traits. Real deployments back
//! them with provider API clients; `warpscale-state` backs them with an
//! embedded store, and tests use in-process fakes.

use crate::error::FleetResult;
use crate::types::{Alarm, Datapoint, Group, Instance, Metric, ScalingPolicy, Statistic, Timestamp};

/// Fleet-management system: groups, their policies and instances, and
/// policy execution.
pub trait FleetApi {
    /// List every group visible to the engine.
    fn list_groups(&self) -> FleetResult<Vec<Group>>;

    /// Scaling policies of a group, in provider order.
    fn scaling_policies(&self, group: &Group) -> FleetResult<Vec<ScalingPolicy>>;

    /// Instances currently belonging to a group.
    fn instances(&self, group: &Group) -> FleetResult<Vec<Instance>>;

    /// Execute a scaling policy. With `honor_cooldown = false` the
    /// provider's own cooldown enforcement is bypassed.
    fn execute_policy(
        &self,
        group: &Group,
        policy: &ScalingPolicy,
        honor_cooldown: bool,
    ) -> FleetResult<()>;
}

/// Metrics system: alarms and time-series statistics.
pub trait MetricsApi {
    /// Fetch an alarm by name.
    fn get_alarm(&self, name: &str) -> FleetResult<Alarm>;

    /// Aggregated datapoints of `metric` over `[start, end]`, one per
    /// `period` seconds that has samples, in ascending time order.
    fn query_statistics(
        &self,
        metric: &Metric,
        start: Timestamp,
        end: Timestamp,
        period: u64,
        statistic: Statistic,
    ) -> FleetResult<Vec<Datapoint>>;
}
