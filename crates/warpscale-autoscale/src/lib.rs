//! warpscale-autoscale: the scaling decision engine.
//!
//! Each run treats the fleet as frozen at one instant (`now`) and makes
//! at most one scaling decision per group. Two evaluators cooperate:
//!
//! ```text
//! Orchestrator (per group)
//!   ├── PredictiveScaleUp::evaluate(group)
//!   │     load(now) vs load(now - lookback)   ── validity gate
//!   │     load(now - lookback + lookahead) / instances(now)
//!   │     ├── fires → execute scale-up policy, stop
//!   │     └── always → CheckPredicate per (alarm, window)
//!   └── FlexibleScaleDown::evaluate(group, &checks)   (only if no scale-up)
//!         veto if any CheckPredicate fires at (desired + adjustment)
//!         alarm state / variable threshold
//!         cooldown (desired-capacity history, scanned newest first)
//!         billing-cycle eligibility
//!         └── pass → execute scale-down policy, stop
//! ```
//!
//! Indeterminate data (missing datapoints, thin history, degenerate
//! inputs) always means "skip this check", never a guess. Collaborator
//! failures surface as `EvalError` for the group being evaluated; the
//! orchestrator logs them and moves on to the next group.

pub mod cooldown;
pub mod error;
pub mod flexible_down;
pub mod load;
pub mod orchestrator;
pub mod predictive;
pub mod threshold;

#[cfg(test)]
mod fake;

pub use cooldown::{Cooldown, CooldownTracker, Transitions};
pub use error::{EvalError, EvalResult};
pub use flexible_down::{FlexibleScaleDown, ScaleDownOutcome};
pub use load::{Load, LoadSampler};
pub use orchestrator::{EvalContext, GroupOutcome, GroupReport, Orchestrator, RunReport};
pub use predictive::{CheckPredicate, PredictiveScaleUp, ScaleUpOutcome};
pub use threshold::VariableThreshold;
