//! `FleetApi` and `MetricsApi` over the embedded store.
//!
//! Executing a policy applies the adjustment to the stored group and
//! appends a desired-capacity sample, which is what the real fleet
//! system would publish.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use warpscale_core::{
    AdjustmentType, Alarm, Datapoint, FleetApi, FleetError, FleetResult, Group, Instance, Metric,
    MetricsApi, ScalingPolicy, Statistic, Timestamp,
};

use crate::store::FleetStore;

impl FleetApi for FleetStore {
    fn list_groups(&self) -> FleetResult<Vec<Group>> {
        Ok(self.list_group_records()?)
    }

    fn scaling_policies(&self, group: &Group) -> FleetResult<Vec<ScalingPolicy>> {
        Ok(self.list_policies_for_group(&group.name)?)
    }

    fn instances(&self, group: &Group) -> FleetResult<Vec<Instance>> {
        Ok(self.list_instances_for_group(&group.name)?)
    }

    /// The desired-capacity sample is stamped with the wall clock, as a
    /// live fleet would stamp it, not with the run's evaluation time.
    /// Runs evaluated at a past instant therefore never see their own
    /// executions in the capacity history.
    fn execute_policy(
        &self,
        group: &Group,
        policy: &ScalingPolicy,
        honor_cooldown: bool,
    ) -> FleetResult<()> {
        let mut stored = self
            .get_group(&group.name)?
            .ok_or_else(|| FleetError::NotFound(format!("group {}", group.name)))?;

        let target = adjusted_capacity(&stored, policy)?;
        let from = stored.desired_capacity;
        stored.desired_capacity = target;
        self.put_group(&stored)?;
        self.put_sample(
            &Metric::group_desired_capacity(&stored.name),
            Datapoint {
                timestamp: epoch_secs(),
                value: f64::from(target),
            },
        )?;

        info!(
            group = %stored.name,
            policy = %policy.name,
            from,
            to = target,
            honor_cooldown,
            "policy executed"
        );
        Ok(())
    }
}

impl MetricsApi for FleetStore {
    fn get_alarm(&self, name: &str) -> FleetResult<Alarm> {
        self.get_alarm_record(name)?
            .ok_or_else(|| FleetError::NotFound(format!("alarm {name}")))
    }

    fn query_statistics(
        &self,
        metric: &Metric,
        start: Timestamp,
        end: Timestamp,
        period: u64,
        statistic: Statistic,
    ) -> FleetResult<Vec<Datapoint>> {
        Ok(self.statistics(metric, start, end, period, statistic)?)
    }
}

/// Capacity after applying `policy`, clamped to the group's bounds.
fn adjusted_capacity(group: &Group, policy: &ScalingPolicy) -> FleetResult<u32> {
    let current = i64::from(group.desired_capacity);
    let adjustment = i64::from(policy.adjustment);
    let target = match policy.adjustment_type {
        AdjustmentType::ChangeInCapacity => current + adjustment,
        AdjustmentType::ExactCapacity => adjustment,
        AdjustmentType::PercentChangeInCapacity => {
            let delta = current * adjustment / 100;
            // A non-zero percentage always moves by at least one instance.
            if delta == 0 {
                current + adjustment.signum()
            } else {
                current + delta
            }
        }
        AdjustmentType::Other => {
            return Err(FleetError::Unsupported(format!(
                "adjustment type of policy {}",
                policy.name
            )));
        }
    };
    if group.min_size > group.max_size {
        return Err(FleetError::Api(format!(
            "group {} has min_size {} above max_size {}",
            group.name, group.min_size, group.max_size
        )));
    }
    let clamped = target.clamp(i64::from(group.min_size), i64::from(group.max_size));
    Ok(clamped as u32)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
