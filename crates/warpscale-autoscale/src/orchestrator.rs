//! Per-group orchestration of the two evaluators.
//!
//! `evaluate_all` is one run: select groups, evaluate each one against a
//! single `now`, and collect a `RunReport`. A failure inside one group is
//! recorded in its report and never stops the others. `run` repeats that
//! on a fixed interval until shutdown.

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use warpscale_core::config::GroupSelector;
use warpscale_core::{EngineConfig, FleetApi, Group, MetricsApi, Timestamp};

use crate::error::{EvalError, EvalResult};
use crate::flexible_down::FlexibleScaleDown;
use crate::predictive::PredictiveScaleUp;

/// Everything an evaluator may consult during one run.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub fleet: &'a dyn FleetApi,
    pub metrics: &'a dyn MetricsApi,
    /// The instant the whole run is evaluated at.
    pub now: Timestamp,
    /// Report triggers without executing policies.
    pub dry_run: bool,
}

/// What happened to one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GroupOutcome {
    ScaledUp { policy: String },
    ScaledDown { policy: String },
    NoAction,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub group: String,
    #[serde(flatten)]
    pub outcome: GroupOutcome,
}

impl GroupReport {
    /// True if a policy was executed (or would have been, in a dry run).
    pub fn triggered(&self) -> bool {
        matches!(
            self.outcome,
            GroupOutcome::ScaledUp { .. } | GroupOutcome::ScaledDown { .. }
        )
    }
}

/// Result of one evaluation run over all selected groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub evaluated_at: Timestamp,
    pub dry_run: bool,
    pub groups: Vec<GroupReport>,
}

impl RunReport {
    pub fn triggered_count(&self) -> usize {
        self.groups.iter().filter(|g| g.triggered()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| matches!(g.outcome, GroupOutcome::Failed { .. }))
            .count()
    }
}

/// Runs predictive scale-up, then flexible scale-down, for each group.
pub struct Orchestrator {
    dry_run: bool,
    groups: GroupSelector,
    predictive: Option<PredictiveScaleUp>,
    flexible_down: Option<FlexibleScaleDown>,
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            dry_run: config.dry_run,
            groups: config.groups,
            predictive: config.predictive.map(PredictiveScaleUp::new),
            flexible_down: config.flexible_down.map(FlexibleScaleDown::new),
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Evaluate one group. Scale-down is skipped when scale-up triggered.
    pub fn evaluate_group(&self, ctx: &EvalContext<'_>, group: &Group) -> EvalResult<GroupOutcome> {
        let mut checks = Vec::new();

        if let Some(predictive) = &self.predictive {
            let up = predictive.evaluate(ctx, group)?;
            if let Some(policy) = up.triggered_policy {
                return Ok(GroupOutcome::ScaledUp { policy });
            }
            checks = up.checks;
        }

        if let Some(flexible_down) = &self.flexible_down {
            let down = flexible_down.evaluate(ctx, group, &checks)?;
            if let Some(policy) = down.triggered_policy {
                return Ok(GroupOutcome::ScaledDown { policy });
            }
        }

        Ok(GroupOutcome::NoAction)
    }

    /// Evaluate every selected group at `now`.
    ///
    /// Only a failure to list groups fails the run; everything else is
    /// reported per group.
    pub fn evaluate_all(
        &self,
        fleet: &dyn FleetApi,
        metrics: &dyn MetricsApi,
        now: Timestamp,
    ) -> EvalResult<RunReport> {
        let ctx = EvalContext {
            fleet,
            metrics,
            now,
            dry_run: self.dry_run,
        };

        let mut reports = Vec::new();
        for selected in self.select_groups(fleet)? {
            let report = match selected {
                Ok(group) => {
                    let outcome = match self.evaluate_group(&ctx, &group) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(group = %group.name, error = %e, "group evaluation failed");
                            GroupOutcome::Failed {
                                error: e.to_string(),
                            }
                        }
                    };
                    debug!(group = %group.name, outcome = ?outcome, "group evaluated");
                    GroupReport {
                        group: group.name,
                        outcome,
                    }
                }
                Err(name) => {
                    let e = EvalError::GroupNotFound(name.clone());
                    warn!(group = %name, "configured group does not exist");
                    GroupReport {
                        group: name,
                        outcome: GroupOutcome::Failed {
                            error: e.to_string(),
                        },
                    }
                }
            };
            reports.push(report);
        }

        let report = RunReport {
            evaluated_at: now,
            dry_run: self.dry_run,
            groups: reports,
        };
        info!(
            groups = report.groups.len(),
            triggered = report.triggered_count(),
            failed = report.failed_count(),
            dry_run = self.dry_run,
            "evaluation run complete"
        );
        Ok(report)
    }

    /// Resolve the selector against the fleet. Configured names that do
    /// not exist come back as `Err(name)`. A name listed more than once
    /// is kept at its first position only.
    fn select_groups(&self, fleet: &dyn FleetApi) -> EvalResult<Vec<Result<Group, String>>> {
        let all = fleet.list_groups()?;
        let selected = match &self.groups {
            GroupSelector::Names(names) => {
                let mut seen = HashSet::new();
                names
                    .iter()
                    .filter(|name| seen.insert(name.as_str()))
                    .map(|name| {
                        all.iter()
                            .find(|g| &g.name == name)
                            .cloned()
                            .ok_or_else(|| name.clone())
                    })
                    .collect()
            }
            GroupSelector::Fleet(tag) => all
                .into_iter()
                .filter(|g| g.fleet.as_deref() == Some(tag.as_str()))
                .map(Ok)
                .collect::<Vec<_>>(),
        };
        Ok(selected)
    }

    /// Evaluate on a fixed interval until `shutdown` changes.
    ///
    /// The first run starts immediately. Each completed report is handed
    /// to `on_report`.
    pub async fn run(
        &self,
        fleet: &dyn FleetApi,
        metrics: &dyn MetricsApi,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
        mut on_report: impl FnMut(&RunReport),
    ) {
        info!(interval_secs = interval.as_secs(), "scaling engine started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.evaluate_all(fleet, metrics, epoch_now()) {
                        Ok(report) => on_report(&report),
                        Err(e) => error!(error = %e, "evaluation run failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("scaling engine shutting down");
                    break;
                }
            }
        }
    }
}

/// Current Unix time in seconds.
pub fn epoch_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
