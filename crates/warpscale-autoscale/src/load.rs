//! Load sampling: instance-count-normalized demand around a point in time.

use tracing::debug;

use warpscale_core::{FleetResult, Group, Metric, MetricsApi, Statistic, Timestamp};

/// Resolution used for every load query.
pub const SAMPLE_PERIOD_SECS: u64 = 60;

/// Demand observed over one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Load {
    /// Average metric value multiplied by the average instance count.
    pub load: f64,
    /// Average in-service instance count over the window.
    pub instances: f64,
}

/// Computes `Load` for a group's metric over windows centered on a time.
pub struct LoadSampler<'a> {
    metrics: &'a dyn MetricsApi,
}

impl<'a> LoadSampler<'a> {
    pub fn new(metrics: &'a dyn MetricsApi) -> Self {
        Self { metrics }
    }

    /// Load of `metric` over `[time - window/2, time + window/2]`.
    ///
    /// Returns `None` when either the metric or the group's in-service
    /// instance count has no datapoints in the window.
    pub fn load_for(
        &self,
        group: &Group,
        metric: &Metric,
        time: Timestamp,
        window: u64,
    ) -> FleetResult<Option<Load>> {
        let start = time.saturating_sub(window / 2);
        let end = time.saturating_add(window / 2);

        let value = self.average(metric, start, end)?;
        let instances = self.average(&Metric::group_in_service_instances(&group.name), start, end)?;

        match (value, instances) {
            (Some(value), Some(instances)) => Ok(Some(Load {
                load: value * instances,
                instances,
            })),
            _ => {
                debug!(
                    group = %group.name,
                    metric = %metric.name,
                    time,
                    window,
                    "no datapoints for load window"
                );
                Ok(None)
            }
        }
    }

    /// Mean of the per-minute averages of `metric` in `[start, end]`.
    fn average(&self, metric: &Metric, start: Timestamp, end: Timestamp) -> FleetResult<Option<f64>> {
        let points =
            self.metrics
                .query_statistics(metric, start, end, SAMPLE_PERIOD_SECS, Statistic::Average)?;
        if points.is_empty() {
            return Ok(None);
        }
        let sum: f64 = points.iter().map(|p| p.value).sum();
        Ok(Some(sum / points.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeCloud, NOW, test_group};

    fn cpu() -> Metric {
        Metric::new("Compute", "CPUUtilization").with_dimension("AutoScalingGroupName", "web")
    }

    #[test]
    fn load_is_value_times_instances() {
        let mut cloud = FakeCloud::new();
        cloud.add_group(test_group("web", 4, 1, 10));
        cloud.flat_series(&cpu(), NOW - 600, NOW, 50.0);
        cloud.flat_series(&Metric::group_in_service_instances("web"), NOW - 600, NOW, 4.0);

        let sampler = LoadSampler::new(&cloud);
        let load = sampler
            .load_for(&test_group("web", 4, 1, 10), &cpu(), NOW, 600)
            .unwrap()
            .unwrap();
        assert_eq!(load.instances, 4.0);
        assert_eq!(load.load, 200.0);
    }

    #[test]
    fn averages_over_window() {
        let mut cloud = FakeCloud::new();
        cloud.series_points(&cpu(), &[(NOW - 120, 10.0), (NOW - 60, 30.0)]);
        cloud.series_points(
            &Metric::group_in_service_instances("web"),
            &[(NOW - 120, 2.0), (NOW - 60, 4.0)],
        );

        let sampler = LoadSampler::new(&cloud);
        let load = sampler
            .load_for(&test_group("web", 3, 1, 10), &cpu(), NOW, 600)
            .unwrap()
            .unwrap();
        assert_eq!(load.instances, 3.0);
        assert_eq!(load.load, 60.0);
    }

    #[test]
    fn window_is_centered_on_time() {
        let mut cloud = FakeCloud::new();
        // Only data well outside [t - 150, t + 150].
        let t = NOW - 3600;
        cloud.series_points(&cpu(), &[(t - 600, 10.0), (t + 600, 10.0)]);
        cloud.flat_series(&Metric::group_in_service_instances("web"), t - 900, t + 900, 2.0);

        let sampler = LoadSampler::new(&cloud);
        let load = sampler
            .load_for(&test_group("web", 2, 1, 10), &cpu(), t, 300)
            .unwrap();
        assert!(load.is_none());
    }

    #[test]
    fn missing_instance_count_is_indeterminate() {
        let mut cloud = FakeCloud::new();
        cloud.flat_series(&cpu(), NOW - 600, NOW, 50.0);

        let sampler = LoadSampler::new(&cloud);
        let load = sampler
            .load_for(&test_group("web", 4, 1, 10), &cpu(), NOW, 600)
            .unwrap();
        assert!(load.is_none());
    }
}
