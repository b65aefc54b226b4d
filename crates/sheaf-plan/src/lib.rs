//! Sheaf Plan
//!
//! The synchronous half of the orchestrator. Everything here is pure and
//! side-effect free:
//!
//! - [`Glob`] / [`GlobSet`] match method names against allow/deny patterns
//! - [`Policy`] is the compiled, immutable form of the policy configuration
//! - [`validate`] admits or rejects a batch before anything runs
//! - [`Graph`] indexes sub-call dependencies
//! - [`group`] turns a validated batch into an [`ExecutionPlan`]
//!
//! ```text
//! BatchDef ──validate(policy)──▶ ok ──group(strategy)──▶ ExecutionPlan
//!                                                       [stage 0] [stage 1] ...
//! ```

mod error;
mod glob;
mod graph;
mod plan;
#[cfg(test)]
mod plan_proptest;
mod policy;
mod validate;

pub use error::{PatternError, ValidationError};
pub use glob::{Glob, GlobSet};
pub use graph::Graph;
pub use plan::{ExecutionPlan, Stage, group};
pub use policy::Policy;
pub use validate::validate;

pub use sheaf_config::GroupingStrategy;
