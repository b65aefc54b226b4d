//! The method invocation seam.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::CallError;

/// Resolves method names and performs calls on behalf of the orchestrator.
///
/// The invoker owns the registry of callable methods. The orchestrator only
/// asks for the full name list once (at build time) and resolves names as
/// sub-calls run.
#[async_trait]
pub trait MethodInvoker: Send + Sync + 'static {
  /// Resolved, callable form of a method.
  type Handle: Send + Sync + 'static;

  /// Every method name this invoker can resolve.
  fn method_names(&self) -> Vec<String>;

  /// Look up a method by its fully-qualified name.
  fn resolve(&self, method: &str) -> Option<Self::Handle>;

  /// Invoke a resolved method.
  ///
  /// Must settle with either a value or an error. Timeouts, if any, are
  /// applied around this call by the executor.
  async fn call(
    &self,
    handle: &Self::Handle,
    params: serde_json::Value,
    ctx: &CallContext,
  ) -> Result<serde_json::Value, CallError>;
}

/// Immutable snapshot of the method names an invoker exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodCatalog {
  names: BTreeSet<String>,
}

impl MethodCatalog {
  /// Snapshot the invoker's method names.
  pub fn snapshot<I: MethodInvoker>(invoker: &I) -> Self {
    Self {
      names: invoker.method_names().into_iter().collect(),
    }
  }

  pub fn contains(&self, method: &str) -> bool {
    self.names.contains(method)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  /// Method names in ascending order.
  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

impl<S: Into<String>> FromIterator<S> for MethodCatalog {
  fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
    Self {
      names: iter.into_iter().map(Into::into).collect(),
    }
  }
}
