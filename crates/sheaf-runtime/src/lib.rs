//! Sheaf Runtime
//!
//! Executes validated batches and exposes the [`Orchestrator`] facade.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator::handle(body, request)
//! ├── BatchDef::from_slice        parse, keep object/array shape
//! ├── sheaf_plan::validate        structure, cardinality, allow/deny
//! ├── sheaf_plan::group           stages of concurrently runnable sub-calls
//! ├── StageExecutor::execute      stage by stage, join_all within a stage
//! │   └── MethodInvoker::call     one spawned task per sub-call
//! └── assemble                    results back in submission order and shape
//! ```
//!
//! Batch-level failures (bad body, too many sub-calls, forbidden methods) are
//! answered with a single structured error. Failures of individual sub-calls
//! are data: they appear under the sub-call's key in a successful response.
//!
//! # Usage
//!
//! ```ignore
//! use sheaf_runtime::{MethodRegistry, Orchestrator, RequestContext};
//!
//! let mut registry = MethodRegistry::new();
//! registry.register_fn("users.get", |params, _ctx| async move {
//!     Ok(serde_json::json!({ "id": params["id"] }))
//! });
//!
//! let orchestrator = Orchestrator::builder(registry).config(config).build()?;
//! let response = orchestrator.handle(body, &RequestContext::new()).await;
//! ```

mod context;
mod error;
mod events;
mod executor;
mod invoker;
mod orchestrator;
mod registry;
mod result;

pub use context::{CallContext, RequestContext};
pub use error::{BatchError, BuildError, CallError, CallErrorKind};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use executor::StageExecutor;
pub use invoker::{MethodCatalog, MethodInvoker};
pub use orchestrator::{BatchResponse, ErrorHandler, Next, Orchestrator, OrchestratorBuilder};
pub use registry::{FnMethod, Method, MethodRegistry};
pub use result::{CallOutcome, ResultMapping, assemble, outcome_value};

pub use sheaf_config::{BatchDef, CallDef, DocumentShape, GroupingStrategy, OrchestratorConfig};
pub use sheaf_plan::{ExecutionPlan, Policy, Stage, ValidationError};
