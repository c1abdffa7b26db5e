//! Fleet snapshots: a JSON document holding a recorded fleet state.
//!
//! Loading a snapshot into an in-memory store lets the engine evaluate a
//! captured fleet offline.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use warpscale_core::{Alarm, Datapoint, Group, Instance, Metric, ScalingPolicy};

use crate::error::{StateError, StateResult};
use crate::store::FleetStore;

/// Raw samples of one metric series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesSamples {
    pub metric: Metric,
    pub points: Vec<Datapoint>,
}

/// A complete recorded fleet state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetSnapshot {
    pub groups: Vec<Group>,
    pub policies: Vec<ScalingPolicy>,
    pub alarms: Vec<Alarm>,
    pub instances: Vec<Instance>,
    pub series: Vec<SeriesSamples>,
}

impl FleetSnapshot {
    pub fn from_file(path: &Path) -> StateResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| StateError::Read(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| StateError::Deserialize(e.to_string()))
    }
}

impl FleetStore {
    /// Import every record of `snapshot`, replacing records with equal keys.
    pub fn load_snapshot(&self, snapshot: &FleetSnapshot) -> StateResult<()> {
        for group in &snapshot.groups {
            self.put_group(group)?;
        }
        for policy in &snapshot.policies {
            self.put_policy(policy)?;
        }
        for alarm in &snapshot.alarms {
            self.put_alarm(alarm)?;
        }
        for instance in &snapshot.instances {
            self.put_instance(instance)?;
        }
        for series in &snapshot.series {
            self.put_samples(&series.metric, &series.points)?;
        }
        info!(
            groups = snapshot.groups.len(),
            policies = snapshot.policies.len(),
            alarms = snapshot.alarms.len(),
            series = snapshot.series.len(),
            "snapshot loaded"
        );
        Ok(())
    }
}
