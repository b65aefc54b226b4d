//! Sheaf Config
//!
//! This crate contains the serializable input types for sheaf: the batch
//! document a client submits and the orchestrator configuration read once
//! at startup.
//!
//! A batch document can arrive in two shapes:
//! - an object keyed by sub-call name (`{"a": {"method": "users.get"}}`)
//! - an array of sub-calls, keyed by position (`[{"method": "users.get"}]`)
//!
//! The shape is remembered so the response can be returned in the same form.

mod batch;
mod call;
mod config;

pub use batch::{BatchDef, DocumentError, DocumentShape};
pub use call::CallDef;
pub use config::{ConfigError, EntryPoint, GroupingStrategy, OrchestratorConfig};
