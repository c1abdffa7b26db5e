//! In-process fake of the fleet and metrics systems for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use warpscale_core::*;

/// A whole hour, so minute-of-hour arithmetic in tests starts at zero.
pub const NOW: Timestamp = 1_699_999_200;

pub fn test_group(name: &str, desired: u32, min: u32, max: u32) -> Group {
    Group {
        name: name.to_string(),
        desired_capacity: desired,
        min_size: min,
        max_size: max,
        fleet: None,
    }
}

pub fn test_policy(group: &str, name: &str, adjustment: i32, alarms: &[&str]) -> ScalingPolicy {
    ScalingPolicy {
        name: name.to_string(),
        group: group.to_string(),
        adjustment,
        adjustment_type: AdjustmentType::ChangeInCapacity,
        alarms: alarms.iter().map(|a| a.to_string()).collect(),
    }
}

pub fn test_alarm(name: &str, metric: Metric, enabled: bool, state: AlarmState) -> Alarm {
    Alarm {
        name: name.to_string(),
        enabled,
        state,
        comparison_operator: ComparisonOperator::GreaterThanThreshold,
        threshold: 70.0,
        metric,
        period: 300,
        evaluation_periods: 2,
        statistic: Statistic::Average,
    }
}

pub fn test_instance(group: &str, id: &str, launch_time: Timestamp) -> Instance {
    Instance {
        id: id.to_string(),
        group: group.to_string(),
        status: InstanceStatus::Running,
        launch_time,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub group: String,
    pub policy: String,
    pub honor_cooldown: bool,
}

#[derive(Default)]
pub struct FakeCloud {
    groups: Vec<Group>,
    policies: HashMap<String, Vec<ScalingPolicy>>,
    instances: HashMap<String, Vec<Instance>>,
    alarms: HashMap<String, Alarm>,
    samples: HashMap<String, BTreeMap<Timestamp, f64>>,
    failing_alarms: Vec<String>,
    executed: Mutex<Vec<Execution>>,
    queries: Mutex<HashMap<String, usize>>,
    policy_lists: AtomicUsize,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    pub fn add_policy(&mut self, policy: ScalingPolicy) {
        self.policies
            .entry(policy.group.clone())
            .or_default()
            .push(policy);
    }

    pub fn add_instance(&mut self, instance: Instance) {
        self.instances
            .entry(instance.group.clone())
            .or_default()
            .push(instance);
    }

    pub fn add_alarm(&mut self, alarm: Alarm) {
        self.alarms.insert(alarm.name.clone(), alarm);
    }

    /// Make `get_alarm(name)` fail with an API error.
    pub fn fail_alarm(&mut self, name: &str) {
        self.failing_alarms.push(name.to_string());
    }

    /// One sample per minute in `[start, end]`.
    pub fn flat_series(&mut self, metric: &Metric, start: Timestamp, end: Timestamp, value: f64) {
        let series = self.samples.entry(metric.series_key()).or_default();
        let mut t = start;
        while t <= end {
            series.insert(t, value);
            t += 60;
        }
    }

    pub fn series_points(&mut self, metric: &Metric, points: &[(Timestamp, f64)]) {
        let series = self.samples.entry(metric.series_key()).or_default();
        for &(t, v) in points {
            series.insert(t, v);
        }
    }

    pub fn executed(&self) -> Vec<Execution> {
        self.executed.lock().unwrap().clone()
    }

    /// Number of statistics queries issued for `metric`.
    pub fn query_count(&self, metric: &Metric) -> usize {
        self.queries
            .lock()
            .unwrap()
            .get(&metric.series_key())
            .copied()
            .unwrap_or(0)
    }

    pub fn policy_list_count(&self) -> usize {
        self.policy_lists.load(Ordering::Relaxed)
    }
}

impl FleetApi for FakeCloud {
    fn list_groups(&self) -> FleetResult<Vec<Group>> {
        Ok(self.groups.clone())
    }

    fn scaling_policies(&self, group: &Group) -> FleetResult<Vec<ScalingPolicy>> {
        self.policy_lists.fetch_add(1, Ordering::Relaxed);
        Ok(self.policies.get(&group.name).cloned().unwrap_or_default())
    }

    fn instances(&self, group: &Group) -> FleetResult<Vec<Instance>> {
        Ok(self.instances.get(&group.name).cloned().unwrap_or_default())
    }

    fn execute_policy(
        &self,
        group: &Group,
        policy: &ScalingPolicy,
        honor_cooldown: bool,
    ) -> FleetResult<()> {
        self.executed.lock().unwrap().push(Execution {
            group: group.name.clone(),
            policy: policy.name.clone(),
            honor_cooldown,
        });
        Ok(())
    }
}

impl MetricsApi for FakeCloud {
    fn get_alarm(&self, name: &str) -> FleetResult<Alarm> {
        if self.failing_alarms.iter().any(|a| a == name) {
            return Err(FleetError::Api(format!("throttled fetching {name}")));
        }
        self.alarms
            .get(name)
            .cloned()
            .ok_or_else(|| FleetError::NotFound(name.to_string()))
    }

    fn query_statistics(
        &self,
        metric: &Metric,
        start: Timestamp,
        end: Timestamp,
        period: u64,
        statistic: Statistic,
    ) -> FleetResult<Vec<Datapoint>> {
        let key = metric.series_key();
        *self.queries.lock().unwrap().entry(key.clone()).or_default() += 1;

        let Some(series) = self.samples.get(&key) else {
            return Ok(Vec::new());
        };
        if start > end {
            return Ok(Vec::new());
        }
        let mut buckets: BTreeMap<Timestamp, Vec<f64>> = BTreeMap::new();
        for (&t, &v) in series.range(start..=end) {
            buckets
                .entry(start + (t - start) / period * period)
                .or_default()
                .push(v);
        }
        Ok(buckets
            .into_iter()
            .map(|(timestamp, values)| {
                let value = match statistic {
                    Statistic::Sum => values.iter().sum(),
                    Statistic::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
                    Statistic::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    Statistic::SampleCount => values.len() as f64,
                    Statistic::Average => values.iter().sum::<f64>() / values.len() as f64,
                };
                Datapoint { timestamp, value }
            })
            .collect())
    }
}
