//! Predictive scale-up.
//!
//! For each scale-up policy, alarm, and lookback window `w`, the load at
//! `now - w + lookahead` is taken as the prediction for `now + lookahead`,
//! provided the load at `now - w` resembles the load now. The predicted
//! per-node value is that past load divided by the current instance
//! count, compared against the alarm's threshold.
//!
//! Every (alarm, window) that produced a prediction leaves behind a
//! `CheckPredicate`, which the scale-down evaluator uses to avoid
//! shrinking into a predicted scale-up.

use tracing::{debug, info};

use warpscale_core::{
    Alarm, ComparisonOperator, Group, PredictiveConfig, ScalingPolicy, within_threshold,
};

use crate::error::EvalResult;
use crate::load::LoadSampler;
use crate::orchestrator::EvalContext;

/// "Would `n` instances trip this alarm?" for one alarm and lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckPredicate {
    pub alarm: String,
    pub lookback_window: u64,
    /// Instance-normalized load at the analogous past point.
    pub past_load: f64,
    pub threshold: f64,
    pub comparison_operator: ComparisonOperator,
}

impl CheckPredicate {
    fn new(alarm: &Alarm, lookback_window: u64, past_load: f64) -> Self {
        Self {
            alarm: alarm.name.clone(),
            lookback_window,
            past_load,
            threshold: alarm.threshold,
            comparison_operator: alarm.comparison_operator,
        }
    }

    /// Predicted per-node metric value with `instances` nodes.
    pub fn predicted_value(&self, instances: f64) -> f64 {
        self.past_load / instances
    }

    /// True if the alarm would fire with `instances` nodes. Non-positive
    /// counts never fire.
    pub fn fires_at(&self, instances: f64) -> bool {
        if !(instances > 0.0) {
            return false;
        }
        self.comparison_operator
            .compare(self.predicted_value(instances), self.threshold)
    }
}

/// Outcome of predictive evaluation for one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleUpOutcome {
    /// Policy that was triggered, if any.
    pub triggered_policy: Option<String>,
    /// Checks gathered for every evaluated (alarm, window).
    pub checks: Vec<CheckPredicate>,
}

impl ScaleUpOutcome {
    pub fn triggered(&self) -> bool {
        self.triggered_policy.is_some()
    }
}

/// Evaluates scale-up policies against predicted load.
pub struct PredictiveScaleUp {
    config: PredictiveConfig,
}

impl PredictiveScaleUp {
    pub fn new(config: PredictiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PredictiveConfig {
        &self.config
    }

    /// Evaluate a group. Returns at the first policy that fires.
    pub fn evaluate(&self, ctx: &EvalContext<'_>, group: &Group) -> EvalResult<ScaleUpOutcome> {
        let mut outcome = ScaleUpOutcome::default();

        if self.config.lookback_windows.is_empty() {
            debug!(group = %group.name, "no lookback windows configured");
            return Ok(outcome);
        }
        let Some(lookahead) = self.config.lookahead_window else {
            debug!(group = %group.name, "no lookahead window configured");
            return Ok(outcome);
        };

        let sampler = LoadSampler::new(ctx.metrics);
        let policies = ctx.fleet.scaling_policies(group)?;

        for policy in policies.iter().filter(|p| p.is_scale_up()) {
            for alarm_name in &policy.alarms {
                let alarm = ctx.metrics.get_alarm(alarm_name)?;

                let Some(now_load) =
                    sampler.load_for(group, &alarm.metric, ctx.now, self.config.valid_period)?
                else {
                    debug!(group = %group.name, alarm = %alarm.name, "current load unknown");
                    continue;
                };

                for &window in &self.config.lookback_windows {
                    let then = ctx.now.saturating_sub(window);

                    let Some(then_load) =
                        sampler.load_for(group, &alarm.metric, then, self.config.valid_period)?
                    else {
                        debug!(
                            group = %group.name,
                            alarm = %alarm.name,
                            window_secs = window,
                            "past load unknown"
                        );
                        continue;
                    };

                    if let Some(valid) = self.config.valid_threshold
                        && !within_threshold(valid, now_load.load, then_load.load)
                    {
                        debug!(
                            group = %group.name,
                            alarm = %alarm.name,
                            window_secs = window,
                            now_load = now_load.load,
                            then_load = then_load.load,
                            "past load not comparable to current load"
                        );
                        continue;
                    }

                    let Some(past) =
                        sampler.load_for(group, &alarm.metric, then + lookahead, alarm.period)?
                    else {
                        debug!(
                            group = %group.name,
                            alarm = %alarm.name,
                            window_secs = window,
                            "lookahead load unknown"
                        );
                        continue;
                    };

                    let check = CheckPredicate::new(&alarm, window, past.load);
                    let fires = check.fires_at(now_load.instances);
                    debug!(
                        group = %group.name,
                        alarm = %alarm.name,
                        window_secs = window,
                        predicted = check.predicted_value(now_load.instances),
                        threshold = alarm.threshold,
                        fires,
                        "predicted alarm value"
                    );
                    outcome.checks.push(check);

                    if fires {
                        self.trigger(ctx, group, policy, &alarm, window)?;
                        outcome.triggered_policy = Some(policy.name.clone());
                        return Ok(outcome);
                    }
                }
            }
        }

        Ok(outcome)
    }

    fn trigger(
        &self,
        ctx: &EvalContext<'_>,
        group: &Group,
        policy: &ScalingPolicy,
        alarm: &Alarm,
        window: u64,
    ) -> EvalResult<()> {
        if ctx.dry_run {
            info!(
                group = %group.name,
                policy = %policy.name,
                alarm = %alarm.name,
                window_secs = window,
                "dry run: would execute predictive scale-up"
            );
            return Ok(());
        }
        ctx.fleet.execute_policy(group, policy, false)?;
        info!(
            group = %group.name,
            policy = %policy.name,
            alarm = %alarm.name,
            window_secs = window,
            "executed predictive scale-up"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::*;
    use warpscale_core::{AlarmState, Metric};

    const HOUR: u64 = 3600;

    fn cpu() -> Metric {
        Metric::new("Compute", "CPUUtilization").with_dimension("AutoScalingGroupName", "web")
    }

    fn config(valid_threshold: Option<f64>) -> PredictiveConfig {
        PredictiveConfig {
            lookback_windows: vec![HOUR],
            lookahead_window: Some(1800),
            valid_threshold,
            valid_period: 600,
        }
    }

    /// Group "web" with 4 nodes and one scale-up policy on a 70% CPU alarm.
    ///
    /// CPU is `now_cpu` around now, `then_cpu` an hour ago, and
    /// `ahead_cpu` half an hour after that.
    fn cloud(now_cpu: f64, then_cpu: f64, ahead_cpu: f64) -> FakeCloud {
        let mut cloud = FakeCloud::new();
        cloud.add_group(test_group("web", 4, 2, 10));
        cloud.add_policy(test_policy("web", "scale-up", 1, &["cpu-high"]));
        cloud.add_alarm(test_alarm("cpu-high", cpu(), true, AlarmState::Ok));

        let instances = Metric::group_in_service_instances("web");
        cloud.flat_series(&instances, NOW - 2 * HOUR, NOW, 4.0);
        cloud.flat_series(&cpu(), NOW - 600, NOW, now_cpu);
        cloud.flat_series(&cpu(), NOW - HOUR - 300, NOW - HOUR + 300, then_cpu);
        cloud.flat_series(&cpu(), NOW - HOUR + 1800 - 150, NOW - HOUR + 1800 + 150, ahead_cpu);
        cloud
    }

    fn ctx(cloud: &FakeCloud, dry_run: bool) -> EvalContext<'_> {
        EvalContext {
            fleet: cloud,
            metrics: cloud,
            now: NOW,
            dry_run,
        }
    }

    fn web() -> Group {
        test_group("web", 4, 2, 10)
    }

    #[test]
    fn fires_when_lookahead_load_exceeds_threshold() {
        let cloud = cloud(50.0, 50.0, 90.0);
        let outcome = PredictiveScaleUp::new(config(Some(0.8)))
            .evaluate(&ctx(&cloud, false), &web())
            .unwrap();

        assert_eq!(outcome.triggered_policy.as_deref(), Some("scale-up"));
        assert_eq!(outcome.checks.len(), 1);
        assert_eq!(
            cloud.executed(),
            vec![Execution {
                group: "web".to_string(),
                policy: "scale-up".to_string(),
                honor_cooldown: false,
            }]
        );
    }

    #[test]
    fn quiet_lookahead_records_check_without_firing() {
        let cloud = cloud(50.0, 50.0, 60.0);
        let outcome = PredictiveScaleUp::new(config(Some(0.8)))
            .evaluate(&ctx(&cloud, false), &web())
            .unwrap();

        assert!(!outcome.triggered());
        assert_eq!(outcome.checks.len(), 1);
        let check = &outcome.checks[0];
        assert_eq!(check.past_load, 240.0);
        // 240 / 3 = 80 > 70: shrinking to three nodes would trip the alarm.
        assert!(check.fires_at(3.0));
        assert!(!check.fires_at(4.0));
        assert!(cloud.executed().is_empty());
    }

    #[test]
    fn dissimilar_past_load_is_skipped() {
        // now_load = 400, then_load = 280, and 0.8 * 400 = 320 is not below 280.
        let cloud = cloud(100.0, 70.0, 200.0);
        let outcome = PredictiveScaleUp::new(config(Some(0.8)))
            .evaluate(&ctx(&cloud, false), &web())
            .unwrap();

        assert!(!outcome.triggered());
        assert!(outcome.checks.is_empty());
        assert!(cloud.executed().is_empty());
    }

    #[test]
    fn validity_gate_is_optional() {
        let cloud = cloud(100.0, 70.0, 200.0);
        let outcome = PredictiveScaleUp::new(config(None))
            .evaluate(&ctx(&cloud, false), &web())
            .unwrap();
        assert!(outcome.triggered());
    }

    #[test]
    fn dry_run_reports_trigger_without_executing() {
        let cloud = cloud(50.0, 50.0, 90.0);
        let outcome = PredictiveScaleUp::new(config(Some(0.8)))
            .evaluate(&ctx(&cloud, true), &web())
            .unwrap();
        assert!(outcome.triggered());
        assert!(cloud.executed().is_empty());
    }

    #[test]
    fn missing_history_skips_window() {
        let mut cloud = FakeCloud::new();
        cloud.add_group(web());
        cloud.add_policy(test_policy("web", "scale-up", 1, &["cpu-high"]));
        cloud.add_alarm(test_alarm("cpu-high", cpu(), true, AlarmState::Ok));
        cloud.flat_series(&Metric::group_in_service_instances("web"), NOW - 600, NOW, 4.0);
        cloud.flat_series(&cpu(), NOW - 600, NOW, 90.0);

        let outcome = PredictiveScaleUp::new(config(Some(0.8)))
            .evaluate(&ctx(&cloud, false), &web())
            .unwrap();
        assert!(!outcome.triggered());
        assert!(outcome.checks.is_empty());
    }

    #[test]
    fn first_firing_window_wins() {
        let mut cloud = cloud(50.0, 50.0, 90.0);
        // A second, day-long window that would also fire is never consulted.
        cloud.flat_series(&cpu(), NOW - 24 * HOUR - 300, NOW - 24 * HOUR + 2100, 95.0);
        let mut cfg = config(Some(0.8));
        cfg.lookback_windows = vec![HOUR, 24 * HOUR];

        let outcome = PredictiveScaleUp::new(cfg)
            .evaluate(&ctx(&cloud, false), &web())
            .unwrap();
        assert_eq!(outcome.checks.len(), 1);
        assert_eq!(outcome.checks[0].lookback_window, HOUR);
        assert_eq!(cloud.executed().len(), 1);
    }

    #[test]
    fn scale_down_policies_are_ignored() {
        let mut cloud = FakeCloud::new();
        cloud.add_policy(test_policy("web", "scale-down", -1, &["cpu-high"]));
        let outcome = PredictiveScaleUp::new(config(Some(0.8)))
            .evaluate(&ctx(&cloud, false), &web())
            .unwrap();
        assert_eq!(outcome, ScaleUpOutcome::default());
    }

    #[test]
    fn missing_lookahead_is_a_no_op() {
        let cloud = cloud(50.0, 50.0, 90.0);
        let mut cfg = config(Some(0.8));
        cfg.lookahead_window = None;
        let outcome = PredictiveScaleUp::new(cfg)
            .evaluate(&ctx(&cloud, false), &web())
            .unwrap();
        assert_eq!(outcome, ScaleUpOutcome::default());
        assert_eq!(cloud.policy_list_count(), 0);
    }

    #[test]
    fn unrecognized_operator_never_fires() {
        let alarm = Alarm {
            comparison_operator: ComparisonOperator::Unrecognized,
            ..test_alarm("odd", cpu(), true, AlarmState::Ok)
        };
        let check = CheckPredicate::new(&alarm, HOUR, 1_000_000.0);
        assert!(!check.fires_at(1.0));
    }

    #[test]
    fn zero_instances_never_fire() {
        let alarm = test_alarm("cpu-high", cpu(), true, AlarmState::Ok);
        let check = CheckPredicate::new(&alarm, HOUR, 500.0);
        assert!(!check.fires_at(0.0));
        assert!(!check.fires_at(-1.0));
    }

    #[test]
    fn alarm_fetch_failure_propagates() {
        let mut cloud = cloud(50.0, 50.0, 90.0);
        cloud.fail_alarm("cpu-high");
        let result = PredictiveScaleUp::new(config(Some(0.8))).evaluate(&ctx(&cloud, false), &web());
        assert!(result.is_err());
        assert!(cloud.executed().is_empty());
    }
}
