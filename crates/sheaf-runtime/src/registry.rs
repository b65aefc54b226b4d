//! In-process method registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::CallError;
use crate::invoker::MethodInvoker;

/// A callable method.
#[async_trait]
pub trait Method: Send + Sync {
  async fn call(
    &self,
    params: serde_json::Value,
    ctx: &CallContext,
  ) -> Result<serde_json::Value, CallError>;
}

/// Adapts an async closure into a [`Method`].
pub struct FnMethod<F>(F);

impl<F> FnMethod<F> {
  pub fn new(f: F) -> Self {
    Self(f)
  }
}

#[async_trait]
impl<F, Fut> Method for FnMethod<F>
where
  F: Fn(serde_json::Value, CallContext) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<serde_json::Value, CallError>> + Send + 'static,
{
  async fn call(
    &self,
    params: serde_json::Value,
    ctx: &CallContext,
  ) -> Result<serde_json::Value, CallError> {
    (self.0)(params, ctx.clone()).await
  }
}

/// A [`MethodInvoker`] backed by an in-memory map of named methods.
///
/// Populate it before handing it to the orchestrator; the orchestrator
/// snapshots the method names at build time.
#[derive(Clone, Default)]
pub struct MethodRegistry {
  methods: HashMap<String, Arc<dyn Method>>,
}

impl MethodRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a method under a fully-qualified name, replacing any previous one.
  pub fn register(&mut self, name: impl Into<String>, method: impl Method + 'static) -> &mut Self {
    self.methods.insert(name.into(), Arc::new(method));
    self
  }

  /// Register an async closure as a method.
  pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
  where
    F: Fn(serde_json::Value, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, CallError>> + Send + 'static,
  {
    self.register(name, FnMethod::new(f))
  }

  pub fn len(&self) -> usize {
    self.methods.len()
  }

  pub fn is_empty(&self) -> bool {
    self.methods.is_empty()
  }
}

#[async_trait]
impl MethodInvoker for MethodRegistry {
  type Handle = Arc<dyn Method>;

  fn method_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.methods.keys().cloned().collect();
    names.sort();
    names
  }

  fn resolve(&self, method: &str) -> Option<Self::Handle> {
    self.methods.get(method).cloned()
  }

  async fn call(
    &self,
    handle: &Self::Handle,
    params: serde_json::Value,
    ctx: &CallContext,
  ) -> Result<serde_json::Value, CallError> {
    handle.call(params, ctx).await
  }
}
