//! Cooldown tracking from the group's desired-capacity history.
//!
//! The fleet system is the source of truth: every run re-reads the
//! desired-capacity series and finds the most recent transitions by
//! scanning it newest first. Nothing is cached across runs.

use std::cmp::Reverse;

use tracing::debug;

use warpscale_core::{
    FleetResult, Group, Metric, MetricsApi, Statistic, Timestamp, within_threshold,
};

/// Resolution of the desired-capacity query.
pub const CAPACITY_PERIOD_SECS: u64 = 60;

/// Minimum fraction of expected datapoints (either way) for the history
/// to be trusted.
pub const COVERAGE_THRESHOLD: f64 = 0.5;

/// Most recent transitions seen in the lookback window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transitions {
    pub up: Option<Timestamp>,
    pub down: Option<Timestamp>,
}

/// Result of a cooldown lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cooldown {
    /// History was too thin to say whether anything happened.
    Indeterminate,
    Known(Transitions),
}

/// Finds the last scale-up and scale-down transitions of a group.
pub struct CooldownTracker<'a> {
    metrics: &'a dyn MetricsApi,
}

impl<'a> CooldownTracker<'a> {
    pub fn new(metrics: &'a dyn MetricsApi) -> Self {
        Self { metrics }
    }

    /// Scan `[now - lookback, now]` of the group's desired capacity.
    pub fn last_transitions(
        &self,
        group: &Group,
        now: Timestamp,
        lookback: u64,
    ) -> FleetResult<Cooldown> {
        let start = now.saturating_sub(lookback);
        let mut points = self.metrics.query_statistics(
            &Metric::group_desired_capacity(&group.name),
            start,
            now,
            CAPACITY_PERIOD_SECS,
            Statistic::Average,
        )?;

        let got = points.len() as f64;
        let expected = (now - start) as f64 / CAPACITY_PERIOD_SECS as f64;
        if !within_threshold(COVERAGE_THRESHOLD, got, expected) {
            debug!(
                group = %group.name,
                got,
                expected,
                "desired-capacity history too sparse"
            );
            return Ok(Cooldown::Indeterminate);
        }

        points.sort_by_key(|p| Reverse(p.timestamp));
        let transitions = scan_newest_first(points.iter().map(|p| (p.timestamp, p.value)));
        debug!(
            group = %group.name,
            up = ?transitions.up,
            down = ?transitions.down,
            "scaling transitions"
        );
        Ok(Cooldown::Known(transitions))
    }
}

/// Classify value changes in a newest-first sequence.
///
/// Each change is stamped with the older point's timestamp. A change
/// where capacity rose going forward in time is recorded under `down`,
/// and one where it fell under `up`; this mapping is relied on by the
/// configured cooldowns and must not be flipped. A decrease counts as
/// `up`, so a scale-down 300s ago is held by a 600s up-down cooldown;
/// where the literal direction rule would name it `down`, the cooldown
/// behavior wins. Only the first (most recent) occurrence of each
/// direction is kept.
fn scan_newest_first(points: impl Iterator<Item = (Timestamp, f64)>) -> Transitions {
    let mut transitions = Transitions::default();
    let mut newer: Option<f64> = None;

    for (timestamp, value) in points {
        if let Some(later) = newer
            && later != value
        {
            let slot = if later > value {
                &mut transitions.down
            } else {
                &mut transitions.up
            };
            slot.get_or_insert(timestamp);
        }
        newer = Some(value);

        if transitions.up.is_some() && transitions.down.is_some() {
            break;
        }
    }

    transitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeCloud, NOW, test_group};

    fn capacity() -> Metric {
        Metric::group_desired_capacity("web")
    }

    fn tracker_result(cloud: &FakeCloud, lookback: u64) -> Cooldown {
        CooldownTracker::new(cloud)
            .last_transitions(&test_group("web", 5, 2, 10), NOW, lookback)
            .unwrap()
    }

    #[test]
    fn flat_series_has_no_transitions() {
        let mut cloud = FakeCloud::new();
        cloud.flat_series(&capacity(), NOW - 1800, NOW, 5.0);

        assert_eq!(
            tracker_result(&cloud, 1800),
            Cooldown::Known(Transitions::default())
        );
    }

    #[test]
    fn decrease_is_recorded_as_up() {
        // Capacity 5 until ten minutes ago, 4 since.
        let mut cloud = FakeCloud::new();
        cloud.flat_series(&capacity(), NOW - 1800, NOW - 660, 5.0);
        cloud.flat_series(&capacity(), NOW - 600, NOW, 4.0);

        let Cooldown::Known(t) = tracker_result(&cloud, 1800) else {
            panic!("expected known transitions");
        };
        assert_eq!(t.up, Some(NOW - 660));
        assert_eq!(t.down, None);
    }

    #[test]
    fn increase_is_recorded_as_down() {
        let mut cloud = FakeCloud::new();
        cloud.flat_series(&capacity(), NOW - 1800, NOW - 360, 3.0);
        cloud.flat_series(&capacity(), NOW - 300, NOW, 4.0);

        let Cooldown::Known(t) = tracker_result(&cloud, 1800) else {
            panic!("expected known transitions");
        };
        assert_eq!(t.down, Some(NOW - 360));
        assert_eq!(t.up, None);
    }

    #[test]
    fn keeps_most_recent_of_each_direction() {
        // Oldest to newest: 3, then 4 from -1200, 3 from -600, 4 from -300.
        let mut cloud = FakeCloud::new();
        cloud.flat_series(&capacity(), NOW - 1800, NOW - 1260, 3.0);
        cloud.flat_series(&capacity(), NOW - 1200, NOW - 660, 4.0);
        cloud.flat_series(&capacity(), NOW - 600, NOW - 360, 3.0);
        cloud.flat_series(&capacity(), NOW - 300, NOW, 4.0);

        let Cooldown::Known(t) = tracker_result(&cloud, 1800) else {
            panic!("expected known transitions");
        };
        // Newest change (rise at -300) lands in `down`, the fall at -600 in `up`.
        assert_eq!(t.down, Some(NOW - 360));
        assert_eq!(t.up, Some(NOW - 660));
    }

    #[test]
    fn sparse_history_is_indeterminate() {
        let mut cloud = FakeCloud::new();
        // Five points where thirty are expected.
        cloud.series_points(
            &capacity(),
            &[
                (NOW - 1500, 5.0),
                (NOW - 1200, 5.0),
                (NOW - 900, 5.0),
                (NOW - 600, 4.0),
                (NOW - 300, 4.0),
            ],
        );
        assert_eq!(tracker_result(&cloud, 1800), Cooldown::Indeterminate);
    }

    #[test]
    fn missing_history_is_indeterminate() {
        let cloud = FakeCloud::new();
        assert_eq!(tracker_result(&cloud, 1800), Cooldown::Indeterminate);
    }

    #[test]
    fn scan_stops_after_both_directions() {
        let t = scan_newest_first(
            [(600, 4.0), (540, 5.0), (480, 4.0), (420, 9.0), (360, 1.0)].into_iter(),
        );
        assert_eq!(t.up, Some(540));
        assert_eq!(t.down, Some(480));
    }
}
