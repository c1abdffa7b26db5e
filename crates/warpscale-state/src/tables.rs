//! redb table definitions for the warpscale fleet store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Groups keyed by `{group}`.
pub const GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("groups");

/// Scaling policies keyed by `{group}:{policy}`.
pub const POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("policies");

/// Instances keyed by `{group}:{instance}`.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");

/// Alarms keyed by `{alarm}`.
pub const ALARMS: TableDefinition<&str, &[u8]> = TableDefinition::new("alarms");

/// Raw metric samples keyed by `{series_key}@{timestamp:020}`.
///
/// Timestamps are zero-padded so lexical key order is time order within
/// a series.
pub const SAMPLES: TableDefinition<&str, &[u8]> = TableDefinition::new("samples");

/// Build the samples-table key for one point of a series.
pub fn sample_key(series_key: &str, timestamp: u64) -> String {
    format!("{series_key}@{timestamp:020}")
}
