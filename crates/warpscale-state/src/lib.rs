//! warpscale-state: embedded fleet and metrics store.
//!
//! Backed by [redb](https://docs.rs/redb), it stands in for the external
//! fleet-management and metrics systems: it implements
//! [`FleetApi`](warpscale_core::FleetApi) and
//! [`MetricsApi`](warpscale_core::MetricsApi) over locally stored groups,
//! policies, alarms, instances, and raw metric samples.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{group}:{policy}`, `{series}@{timestamp}`) keep
//! related records adjacent so prefix and range scans stay cheap.
//!
//! `FleetStore` is `Clone` (backed by `Arc<Database>`).

pub mod api;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use snapshot::{FleetSnapshot, SeriesSamples};
pub use store::FleetStore;
