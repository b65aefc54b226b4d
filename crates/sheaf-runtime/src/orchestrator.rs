//! The orchestrator facade.
//!
//! `handle` is the single entry point: parse, validate, group, execute,
//! assemble. Batch-level errors go through the configured [`ErrorHandler`]
//! if there is one, otherwise they become a structured `{status, message}`
//! response.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use sheaf_config::{BatchDef, DocumentError, EntryPoint, OrchestratorConfig};
use sheaf_plan::{Policy, group, validate};
use tracing::{Instrument, Span, error, info, instrument, warn};

use crate::context::RequestContext;
use crate::error::{BatchError, BuildError};
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::executor::StageExecutor;
use crate::invoker::{MethodCatalog, MethodInvoker};
use crate::result::assemble;

/// Response produced for one batch request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
  /// HTTP-style status code.
  pub status: u16,
  /// Assembled results, or the structured error body.
  pub body: serde_json::Value,
}

impl BatchResponse {
  pub fn ok(body: serde_json::Value) -> Self {
    Self { status: 200, body }
  }

  /// The default structured response for a batch-level error.
  pub fn error(err: &BatchError) -> Self {
    let status = err.status();
    Self {
      status,
      body: json!({ "status": status, "message": err.to_string() }),
    }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Continuation handed to an [`ErrorHandler`]; produces the default response.
#[derive(Debug)]
pub struct Next {
  _private: (),
}

impl Next {
  /// Fall back to the default structured error response.
  pub fn run(self, err: &BatchError) -> BatchResponse {
    BatchResponse::error(err)
  }
}

/// Overrides how batch-level errors are answered.
///
/// Only batch-level errors reach the handler; per-call failures are part of
/// a successful response.
pub trait ErrorHandler: Send + Sync {
  fn handle(&self, err: BatchError, request: &RequestContext, next: Next) -> BatchResponse;
}

impl<F> ErrorHandler for F
where
  F: Fn(BatchError, &RequestContext, Next) -> BatchResponse + Send + Sync,
{
  fn handle(&self, err: BatchError, request: &RequestContext, next: Next) -> BatchResponse {
    self(err, request, next)
  }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder<I: MethodInvoker> {
  invoker: I,
  config: OrchestratorConfig,
  error_handler: Option<Arc<dyn ErrorHandler>>,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl<I: MethodInvoker> OrchestratorBuilder<I> {
  pub fn config(mut self, config: OrchestratorConfig) -> Self {
    self.config = config;
    self
  }

  pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
    self.error_handler = Some(Arc::new(handler));
    self
  }

  pub fn notifier(mut self, notifier: impl ExecutionNotifier + 'static) -> Self {
    self.notifier = Arc::new(notifier);
    self
  }

  /// Compile the policy and snapshot the invoker's method names.
  pub fn build(self) -> Result<Orchestrator<I>, BuildError> {
    if self.config.max_calls == 0 {
      return Err(BuildError::ZeroMaxCalls);
    }
    let policy = Policy::from_config(&self.config)?;
    let catalog = MethodCatalog::snapshot(&self.invoker);
    let invoker = Arc::new(self.invoker);

    let executor = StageExecutor::new(invoker)
      .with_notifier(self.notifier.clone())
      .with_call_timeout(self.config.call_timeout_ms.map(Duration::from_millis));

    info!(
      entry = %self.config.entry.path,
      methods = catalog.len(),
      permitted = policy.permitted(catalog.iter()).len(),
      max_calls = policy.max_calls(),
      "orchestrator_ready"
    );

    Ok(Orchestrator {
      catalog,
      policy,
      config: self.config,
      executor,
      error_handler: self.error_handler,
      notifier: self.notifier,
    })
  }
}

/// Validates, stages, and runs batches of named sub-calls.
///
/// Holds no per-request state; one orchestrator serves any number of
/// concurrent batches.
pub struct Orchestrator<I: MethodInvoker> {
  catalog: MethodCatalog,
  policy: Policy,
  config: OrchestratorConfig,
  executor: StageExecutor<I>,
  error_handler: Option<Arc<dyn ErrorHandler>>,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl<I: MethodInvoker> Orchestrator<I> {
  pub fn builder(invoker: I) -> OrchestratorBuilder<I> {
    OrchestratorBuilder {
      invoker,
      config: OrchestratorConfig::default(),
      error_handler: None,
      notifier: Arc::new(NoopNotifier),
    }
  }

  /// Build with a configuration and no custom error handler or notifier.
  pub fn new(invoker: I, config: OrchestratorConfig) -> Result<Self, BuildError> {
    Self::builder(invoker).config(config).build()
  }

  /// Where the host should mount the orchestrator.
  pub fn entry_point(&self) -> &EntryPoint {
    &self.config.entry
  }

  pub fn config(&self) -> &OrchestratorConfig {
    &self.config
  }

  pub fn policy(&self) -> &Policy {
    &self.policy
  }

  /// Method names known at build time.
  pub fn catalog(&self) -> &MethodCatalog {
    &self.catalog
  }

  /// Known method names that the policy admits.
  pub fn permitted_methods(&self) -> Vec<&str> {
    self.policy.permitted(self.catalog.iter())
  }

  /// Handle a raw request body.
  pub async fn handle(&self, body: &[u8], request: &RequestContext) -> BatchResponse {
    self.handle_document(BatchDef::from_slice(body), request).await
  }

  /// Handle an already-decoded request body.
  pub async fn handle_value(
    &self,
    body: serde_json::Value,
    request: &RequestContext,
  ) -> BatchResponse {
    self.handle_document(BatchDef::from_value(body), request).await
  }

  #[instrument(
    name = "batch_handle",
    skip_all,
    fields(request_id = %request.request_id, batch_id = tracing::field::Empty)
  )]
  async fn handle_document(
    &self,
    document: Result<BatchDef, DocumentError>,
    request: &RequestContext,
  ) -> BatchResponse {
    let batch_id = uuid::Uuid::new_v4().to_string();
    Span::current().record("batch_id", batch_id.as_str());

    match document {
      Ok(batch) => match self.execute(&batch_id, batch, request).await {
        Ok(output) => BatchResponse::ok(output),
        Err(e) => self.reject(&batch_id, e, request),
      },
      Err(e) => self.reject(&batch_id, e.into(), request),
    }
  }

  /// Validate, group, execute, and assemble a parsed batch.
  ///
  /// Returns the assembled output, or the batch-level error without routing
  /// it through the error handler.
  pub async fn run(
    &self,
    batch: BatchDef,
    request: &RequestContext,
  ) -> Result<serde_json::Value, BatchError> {
    let batch_id = uuid::Uuid::new_v4().to_string();
    self.execute(&batch_id, batch, request).await
  }

  async fn execute(
    &self,
    batch_id: &str,
    batch: BatchDef,
    request: &RequestContext,
  ) -> Result<serde_json::Value, BatchError> {
    validate(&batch, &self.policy)?;

    let plan = group(&batch, self.config.grouping);
    info!(
      calls = batch.len(),
      stages = plan.len(),
      shape = ?batch.shape(),
      "batch_started"
    );
    self.notifier.notify(ExecutionEvent::BatchStarted {
      batch_id: batch_id.to_string(),
      request_id: request.request_id.clone(),
      calls: batch.len(),
      stages: plan.len(),
    });

    // Run the stages on their own task so an unexpected panic in the
    // coordination loop surfaces as an internal error instead of unwinding
    // into the caller.
    let executor = self.executor.clone();
    let owned_id = batch_id.to_string();
    let request = Arc::new(request.clone());
    let handle = tokio::spawn(
      async move {
        let results = executor.execute(&owned_id, &plan, &batch, request).await;
        (results, batch)
      }
      .in_current_span(),
    );

    let (results, batch) = handle.await.map_err(|e| {
      error!(error = %e, "batch_execution_aborted");
      BatchError::Internal(format!("batch execution aborted: {e}"))
    })?;

    info!(
      succeeded = results.succeeded(),
      failed = results.failed(),
      "batch_completed"
    );
    self.notifier.notify(ExecutionEvent::BatchCompleted {
      batch_id: batch_id.to_string(),
      succeeded: results.succeeded(),
      failed: results.failed(),
    });

    Ok(assemble(&results, &batch))
  }

  fn reject(&self, batch_id: &str, err: BatchError, request: &RequestContext) -> BatchResponse {
    warn!(status = err.status(), kind = err.kind(), error = %err, "batch_rejected");
    self.notifier.notify(ExecutionEvent::BatchRejected {
      batch_id: batch_id.to_string(),
      request_id: request.request_id.clone(),
      status: err.status(),
      error: err.to_string(),
    });

    match &self.error_handler {
      Some(handler) => handler.handle(err, request, Next { _private: () }),
      None => BatchResponse::error(&err),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_response_carries_status_and_message() {
    let response = BatchResponse::error(&BatchError::ForbiddenRequest {
      method: "admin.drop".to_string(),
    });
    assert_eq!(response.status, 403);
    assert!(!response.is_success());
    assert_eq!(
      response.body,
      json!({ "status": 403, "message": "forbidden request: method 'admin.drop' is not permitted" })
    );
  }

  #[test]
  fn test_next_produces_default_response() {
    let err = BatchError::InvalidRequestBody("no calls".to_string());
    let response = Next { _private: () }.run(&err);
    assert_eq!(response, BatchResponse::error(&err));
  }

  #[test]
  fn test_ok_response_is_success() {
    let response = BatchResponse::ok(json!({ "a": 1 }));
    assert_eq!(response.status, 200);
    assert!(response.is_success());
  }
}
