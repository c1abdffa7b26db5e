//! Flexible scale-down.
//!
//! A scale-down policy is executed only when every gate passes, in order:
//!
//! 1. the group is above its minimum size
//! 2. no predictive check fires at the post-scale-down capacity
//! 3. the policy's disabled alarms agree (alarm state, or the variable
//!    utilization threshold for the configured metric)
//! 4. the group is out of both cooldowns
//! 5. some running instance is close enough to its billing boundary
//!
//! The first policy to pass is executed and the rest are skipped.

use tracing::{debug, info};

use warpscale_core::{
    AdjustmentType, Alarm, AlarmState, FlexibleDownConfig, Group, Instance, ScalingPolicy,
    VariableThresholdConfig,
};

use crate::cooldown::{Cooldown, CooldownTracker};
use crate::error::EvalResult;
use crate::orchestrator::EvalContext;
use crate::predictive::CheckPredicate;
use crate::threshold::VariableThreshold;

/// Instances with this many minutes or fewer left are too close to the
/// boundary to act on.
const MIN_TIME_LEFT_MINUTES: u64 = 1;

/// Outcome of scale-down evaluation for one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleDownOutcome {
    pub triggered_policy: Option<String>,
}

impl ScaleDownOutcome {
    pub fn triggered(&self) -> bool {
        self.triggered_policy.is_some()
    }
}

/// Lookups shared by every policy of one group within one run.
#[derive(Default)]
struct GroupMemo {
    cooldown: Option<Cooldown>,
    instances: Option<Vec<Instance>>,
}

/// Evaluates scale-down policies against alarms, cooldowns and billing.
pub struct FlexibleScaleDown {
    config: FlexibleDownConfig,
}

impl FlexibleScaleDown {
    pub fn new(config: FlexibleDownConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FlexibleDownConfig {
        &self.config
    }

    /// Evaluate a group's scale-down policies, vetoing any that would
    /// trip one of `checks` after shrinking.
    pub fn evaluate(
        &self,
        ctx: &EvalContext<'_>,
        group: &Group,
        checks: &[CheckPredicate],
    ) -> EvalResult<ScaleDownOutcome> {
        let mut outcome = ScaleDownOutcome::default();

        if self.config.up_down_cooldown.is_none() && self.config.down_down_cooldown.is_none() {
            debug!(group = %group.name, "no cooldowns configured");
            return Ok(outcome);
        }
        if group.desired_capacity <= group.min_size {
            debug!(
                group = %group.name,
                desired = group.desired_capacity,
                min = group.min_size,
                "group at minimum size"
            );
            return Ok(outcome);
        }

        let mut memo = GroupMemo::default();
        let policies = ctx.fleet.scaling_policies(group)?;

        for policy in policies.iter().filter(|p| p.is_scale_down()) {
            if self.vetoed(group, policy, checks) {
                continue;
            }

            let mut disabled = Vec::new();
            for name in &policy.alarms {
                let alarm = ctx.metrics.get_alarm(name)?;
                if !alarm.enabled {
                    disabled.push(alarm);
                }
            }

            let alarms_agree = match &self.config.variable_thresholds {
                Some(vt) => self.variable_alarms_agree(ctx, group, policy, vt, disabled)?,
                None => fixed_alarms_agree(group, policy, &disabled),
            };
            if !alarms_agree {
                continue;
            }

            if !self.out_of_cooldown(ctx, group, &mut memo)? {
                continue;
            }

            if !self.billing_allows(ctx, group, &mut memo)? {
                continue;
            }

            self.trigger(ctx, group, policy)?;
            outcome.triggered_policy = Some(policy.name.clone());
            return Ok(outcome);
        }

        Ok(outcome)
    }

    fn vetoed(&self, group: &Group, policy: &ScalingPolicy, checks: &[CheckPredicate]) -> bool {
        if policy.adjustment_type != AdjustmentType::ChangeInCapacity {
            return false;
        }
        let after = f64::from(group.desired_capacity) + f64::from(policy.adjustment);
        match checks.iter().find(|c| c.fires_at(after)) {
            Some(check) => {
                debug!(
                    group = %group.name,
                    policy = %policy.name,
                    alarm = %check.alarm,
                    window_secs = check.lookback_window,
                    capacity_after = after,
                    "scale-down vetoed by predicted scale-up"
                );
                true
            }
            None => false,
        }
    }

    fn variable_alarms_agree(
        &self,
        ctx: &EvalContext<'_>,
        group: &Group,
        policy: &ScalingPolicy,
        vt: &VariableThresholdConfig,
        mut disabled: Vec<Alarm>,
    ) -> EvalResult<bool> {
        let Some(pos) = disabled.iter().position(|a| a.metric.name == vt.metric_name) else {
            debug!(
                group = %group.name,
                policy = %policy.name,
                metric = %vt.metric_name,
                "no disabled alarm on threshold metric"
            );
            return Ok(false);
        };
        let alarm = disabled.remove(pos);

        let curve = VariableThreshold {
            n_low: vt.n_low.unwrap_or(group.min_size + 1),
            n_high: vt.n_high.unwrap_or(group.max_size),
            m: vt.m.unwrap_or(alarm.threshold),
            g_low: vt.g_low,
            g_high: vt.g_high,
        };

        let under = match curve.at(group.desired_capacity) {
            Some(threshold) if !curve.is_degenerate() => {
                self.recent_values_under(ctx, group, &alarm, threshold)?
            }
            _ => {
                debug!(
                    group = %group.name,
                    alarm = %alarm.name,
                    "degenerate variable threshold, using alarm state"
                );
                alarm.state == AlarmState::Alarm
            }
        };
        if !under {
            return Ok(false);
        }

        Ok(disabled.iter().all(|a| in_alarm(group, policy, a)))
    }

    /// True if the alarm's last `evaluation_periods` periods all sit at or
    /// below `threshold`.
    fn recent_values_under(
        &self,
        ctx: &EvalContext<'_>,
        group: &Group,
        alarm: &Alarm,
        threshold: f64,
    ) -> EvalResult<bool> {
        let span = alarm.period.saturating_mul(u64::from(alarm.evaluation_periods));
        let points = ctx.metrics.query_statistics(
            &alarm.metric,
            ctx.now.saturating_sub(span),
            ctx.now,
            alarm.period,
            alarm.statistic,
        )?;

        if points.len() < alarm.evaluation_periods as usize {
            debug!(
                group = %group.name,
                alarm = %alarm.name,
                got = points.len(),
                want = alarm.evaluation_periods,
                "not enough datapoints for variable threshold"
            );
            return Ok(false);
        }

        let under = points.iter().all(|p| p.value <= threshold);
        debug!(
            group = %group.name,
            alarm = %alarm.name,
            threshold,
            under,
            "variable threshold check"
        );
        Ok(under)
    }

    fn out_of_cooldown(
        &self,
        ctx: &EvalContext<'_>,
        group: &Group,
        memo: &mut GroupMemo,
    ) -> EvalResult<bool> {
        let cooldown = match memo.cooldown {
            Some(c) => c,
            None => {
                let lookback = self
                    .config
                    .up_down_cooldown
                    .max(self.config.down_down_cooldown)
                    .unwrap_or(0);
                let c = CooldownTracker::new(ctx.metrics).last_transitions(group, ctx.now, lookback)?;
                memo.cooldown = Some(c);
                c
            }
        };

        let Cooldown::Known(transitions) = cooldown else {
            debug!(group = %group.name, "cooldown indeterminate, abstaining");
            return Ok(false);
        };

        if let (Some(up), Some(wait)) = (transitions.up, self.config.up_down_cooldown)
            && ctx.now.saturating_sub(up) < wait
        {
            debug!(group = %group.name, since = ctx.now.saturating_sub(up), wait, "in up-down cooldown");
            return Ok(false);
        }
        if let (Some(down), Some(wait)) = (transitions.down, self.config.down_down_cooldown)
            && ctx.now.saturating_sub(down) < wait
        {
            debug!(group = %group.name, since = ctx.now.saturating_sub(down), wait, "in down-down cooldown");
            return Ok(false);
        }
        Ok(true)
    }

    fn billing_allows(
        &self,
        ctx: &EvalContext<'_>,
        group: &Group,
        memo: &mut GroupMemo,
    ) -> EvalResult<bool> {
        let Some(max_sunk_cost) = self.config.max_sunk_cost else {
            return Ok(true);
        };

        if memo.instances.is_none() {
            memo.instances = Some(ctx.fleet.instances(group)?);
        }
        let instances = memo.instances.as_deref().unwrap_or_default();

        let eligible = instances.iter().filter(|i| i.is_running()).find(|i| {
            let left = minutes_to_billing_boundary(i.launch_time, ctx.now);
            left > MIN_TIME_LEFT_MINUTES && left * 60 < max_sunk_cost
        });

        match eligible {
            Some(instance) => {
                debug!(group = %group.name, instance = %instance.id, "instance near billing boundary");
                Ok(true)
            }
            None => {
                debug!(group = %group.name, max_sunk_cost, "no instance near billing boundary");
                Ok(false)
            }
        }
    }

    fn trigger(&self, ctx: &EvalContext<'_>, group: &Group, policy: &ScalingPolicy) -> EvalResult<()> {
        if ctx.dry_run {
            info!(
                group = %group.name,
                policy = %policy.name,
                "dry run: would execute flexible scale-down"
            );
            return Ok(());
        }
        ctx.fleet.execute_policy(group, policy, false)?;
        info!(group = %group.name, policy = %policy.name, "executed flexible scale-down");
        Ok(())
    }
}

fn fixed_alarms_agree(group: &Group, policy: &ScalingPolicy, disabled: &[Alarm]) -> bool {
    if disabled.is_empty() {
        debug!(group = %group.name, policy = %policy.name, "no disabled alarms");
        return false;
    }
    disabled.iter().all(|a| in_alarm(group, policy, a))
}

fn in_alarm(group: &Group, policy: &ScalingPolicy, alarm: &Alarm) -> bool {
    if alarm.state == AlarmState::Alarm {
        return true;
    }
    debug!(
        group = %group.name,
        policy = %policy.name,
        alarm = %alarm.name,
        state = ?alarm.state,
        "alarm not in ALARM state"
    );
    false
}

/// Whole minutes until the instance's next hourly billing boundary.
fn minutes_to_billing_boundary(launch_time: u64, now: u64) -> u64 {
    let launch_minute = (launch_time / 60 % 60) as i64;
    let now_minute = (now / 60 % 60) as i64;
    (launch_minute - now_minute).rem_euclid(60) as u64
}
