//! FleetStore: redb-backed persistence for fleet and metrics records.
//!
//! Provides typed CRUD operations over groups, policies, instances,
//! alarms, and raw metric samples. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for tests and snapshot replay).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use warpscale_core::{Alarm, Datapoint, Group, Instance, Metric, ScalingPolicy, Statistic};

use crate::error::{StateError, StateResult};
use crate::tables::*;

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe fleet store backed by redb.
#[derive(Clone)]
pub struct FleetStore {
    db: Arc<Database>,
}

impl FleetStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "fleet store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory fleet store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for table in [GROUPS, POLICIES, INSTANCES, ALARMS, SAMPLES] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record access ──────────────────────────────────────

    /// Write a batch of already-serialized records in one transaction.
    fn put_raw(&self, table: Table, rows: &[(String, Vec<u8>)]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            for (key, value) in rows {
                t.insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn put_record<T: Serialize>(&self, table: Table, key: &str, record: &T) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        self.put_raw(table, &[(key.to_string(), value)])
    }

    fn get_record<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        match t.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List records whose key starts with `prefix` (all records for `""`).
    fn list_records<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in t.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let record = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    // ── Groups ─────────────────────────────────────────────────────

    /// Insert or update a group.
    pub fn put_group(&self, group: &Group) -> StateResult<()> {
        self.put_record(GROUPS, &group.name, group)?;
        debug!(group = %group.name, desired = group.desired_capacity, "group stored");
        Ok(())
    }

    pub fn get_group(&self, name: &str) -> StateResult<Option<Group>> {
        self.get_record(GROUPS, name)
    }

    /// List all groups, ordered by name.
    pub fn list_group_records(&self) -> StateResult<Vec<Group>> {
        self.list_records(GROUPS, "")
    }

    // ── Policies ───────────────────────────────────────────────────

    /// Insert or update a scaling policy (keyed under its group).
    pub fn put_policy(&self, policy: &ScalingPolicy) -> StateResult<()> {
        self.put_record(POLICIES, &policy_key(policy), policy)
    }

    /// Policies of a group, ordered by policy name.
    pub fn list_policies_for_group(&self, group: &str) -> StateResult<Vec<ScalingPolicy>> {
        self.list_records(POLICIES, &format!("{group}:"))
    }

    // ── Instances ──────────────────────────────────────────────────

    /// Insert or update an instance (keyed under its group).
    pub fn put_instance(&self, instance: &Instance) -> StateResult<()> {
        self.put_record(INSTANCES, &instance_key(instance), instance)
    }

    pub fn list_instances_for_group(&self, group: &str) -> StateResult<Vec<Instance>> {
        self.list_records(INSTANCES, &format!("{group}:"))
    }

    // ── Alarms ─────────────────────────────────────────────────────

    pub fn put_alarm(&self, alarm: &Alarm) -> StateResult<()> {
        self.put_record(ALARMS, &alarm.name, alarm)
    }

    pub fn get_alarm_record(&self, name: &str) -> StateResult<Option<Alarm>> {
        self.get_record(ALARMS, name)
    }

    // ── Metric samples ─────────────────────────────────────────────

    /// Record a raw sample. A second sample at the same timestamp
    /// replaces the first.
    pub fn put_sample(&self, metric: &Metric, point: Datapoint) -> StateResult<()> {
        self.put_samples(metric, &[point])
    }

    /// Record many raw samples of one series in a single transaction.
    pub fn put_samples(&self, metric: &Metric, points: &[Datapoint]) -> StateResult<()> {
        let series = metric.series_key();
        let rows = points
            .iter()
            .map(|p| {
                let value = serde_json::to_vec(p).map_err(map_err!(Serialize))?;
                Ok((sample_key(&series, p.timestamp), value))
            })
            .collect::<StateResult<Vec<_>>>()?;
        self.put_raw(SAMPLES, &rows)
    }

    /// Raw samples of a series with `start <= timestamp <= end`, oldest first.
    pub fn samples_between(&self, metric: &Metric, start: u64, end: u64) -> StateResult<Vec<Datapoint>> {
        if start > end {
            return Ok(Vec::new());
        }
        let series = metric.series_key();
        let lo = sample_key(&series, start);
        let hi = sample_key(&series, end);

        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in t.range(lo.as_str()..=hi.as_str()).map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let point: Datapoint =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(point);
        }
        Ok(results)
    }

    /// Aggregate raw samples into `period`-wide buckets aligned on `start`.
    ///
    /// Each non-empty bucket yields one datapoint stamped with the bucket
    /// start. Empty buckets are omitted, so sparse series return fewer
    /// points than `(end - start) / period`.
    pub fn statistics(
        &self,
        metric: &Metric,
        start: u64,
        end: u64,
        period: u64,
        statistic: Statistic,
    ) -> StateResult<Vec<Datapoint>> {
        let period = period.max(1);
        let mut buckets: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
        for sample in self.samples_between(metric, start, end)? {
            let bucket = start + (sample.timestamp - start) / period * period;
            buckets.entry(bucket).or_default().push(sample.value);
        }
        Ok(buckets
            .into_iter()
            .map(|(timestamp, values)| Datapoint {
                timestamp,
                value: aggregate(statistic, &values),
            })
            .collect())
    }
}

/// Apply a statistic to a non-empty set of samples.
fn aggregate(statistic: Statistic, values: &[f64]) -> f64 {
    match statistic {
        Statistic::Average => values.iter().sum::<f64>() / values.len() as f64,
        Statistic::Sum => values.iter().sum(),
        Statistic::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
        Statistic::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Statistic::SampleCount => values.len() as f64,
    }
}

fn policy_key(policy: &ScalingPolicy) -> String {
    format!("{}:{}", policy.group, policy.name)
}

fn instance_key(instance: &Instance) -> String {
    format!("{}:{}", instance.group, instance.id)
}
