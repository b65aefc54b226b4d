//! Request and per-call contexts.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::result::CallOutcome;

/// Context of the inbound batch request, supplied by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
  /// Unique request ID.
  pub request_id: String,
  /// Transport headers worth forwarding to methods.
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  /// Free-form metadata (caller identity, locale, ...).
  #[serde(default)]
  pub meta: serde_json::Value,
}

impl RequestContext {
  /// Create a context with a fresh request ID.
  pub fn new() -> Self {
    Self {
      request_id: uuid::Uuid::new_v4().to_string(),
      headers: BTreeMap::new(),
      meta: serde_json::Value::Null,
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(name.into(), value.into());
    self
  }

  pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
    self.meta = meta;
    self
  }
}

impl Default for RequestContext {
  fn default() -> Self {
    Self::new()
  }
}

/// Context handed to a method for one sub-call.
///
/// Built fresh for every sub-call; the request part is shared.
#[derive(Debug, Clone)]
pub struct CallContext {
  /// ID of the batch execution.
  pub batch_id: String,
  /// Name of the sub-call within the batch.
  pub call: String,
  /// Method being invoked.
  pub method: String,
  /// Index of the stage the sub-call runs in.
  pub stage: usize,
  /// The inbound request.
  pub request: Arc<RequestContext>,
  /// Settled outcomes of the sub-call's dependencies.
  pub dependencies: BTreeMap<String, CallOutcome>,
}

impl CallContext {
  /// Outcome of a dependency, if it is one.
  pub fn dependency(&self, name: &str) -> Option<&CallOutcome> {
    self.dependencies.get(name)
  }

  /// Value of a dependency that succeeded.
  pub fn dependency_value(&self, name: &str) -> Option<&serde_json::Value> {
    self.dependency(name).and_then(|outcome| outcome.as_ref().ok())
  }
}
