//! Staged execution of a planned batch.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sheaf_config::BatchDef;
use sheaf_plan::ExecutionPlan;
use tracing::{Instrument, error, info, info_span, warn};

use crate::context::{CallContext, RequestContext};
use crate::error::CallError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::invoker::MethodInvoker;
use crate::result::{CallOutcome, ResultMapping};

/// Runs an execution plan stage by stage.
///
/// Stages run strictly in order; stage `n + 1` starts only after every
/// sub-call of stage `n` has settled. Sub-calls within a stage are spawned
/// together and joined. A failing sub-call is recorded and never stops its
/// siblings or later stages.
pub struct StageExecutor<I: MethodInvoker> {
  invoker: Arc<I>,
  notifier: Arc<dyn ExecutionNotifier>,
  call_timeout: Option<Duration>,
}

impl<I: MethodInvoker> Clone for StageExecutor<I> {
  fn clone(&self) -> Self {
    Self {
      invoker: self.invoker.clone(),
      notifier: self.notifier.clone(),
      call_timeout: self.call_timeout,
    }
  }
}

impl<I: MethodInvoker> StageExecutor<I> {
  /// Create an executor with no call timeout and no event notifications.
  pub fn new(invoker: Arc<I>) -> Self {
    Self {
      invoker,
      notifier: Arc::new(NoopNotifier),
      call_timeout: None,
    }
  }

  /// Send execution events to `notifier`.
  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  /// Bound each method invocation by `timeout`.
  pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.call_timeout = timeout;
    self
  }

  /// Execute every stage of `plan` and collect one outcome per sub-call.
  pub async fn execute(
    &self,
    batch_id: &str,
    plan: &ExecutionPlan,
    batch: &BatchDef,
    request: Arc<RequestContext>,
  ) -> ResultMapping {
    let mut results = ResultMapping::new();

    for (index, stage) in plan.iter().enumerate() {
      let span = info_span!("stage_execute", batch_id = %batch_id, stage = index);

      self.notifier.notify(ExecutionEvent::StageStarted {
        batch_id: batch_id.to_string(),
        stage: index,
        calls: stage.calls().to_vec(),
      });

      let (succeeded, failed) = self
        .run_stage(batch_id, index, stage.calls(), batch, &request, &mut results)
        .instrument(span)
        .await;

      self.notifier.notify(ExecutionEvent::StageCompleted {
        batch_id: batch_id.to_string(),
        stage: index,
        succeeded,
        failed,
      });
    }

    results
  }

  /// Spawn every sub-call of one stage and wait for all of them to settle.
  async fn run_stage(
    &self,
    batch_id: &str,
    stage: usize,
    names: &[String],
    batch: &BatchDef,
    request: &Arc<RequestContext>,
    results: &mut ResultMapping,
  ) -> (usize, usize) {
    info!(calls = ?names, "stage_started");

    let handles: Vec<_> = names
      .iter()
      .map(|name| {
        let ctx = self.call_context(batch_id, stage, name, batch, request, results);
        let params = batch
          .get(name)
          .map(|call| call.params.clone())
          .unwrap_or_default();
        let invoker = self.invoker.clone();
        let timeout = self.call_timeout;
        tokio::spawn(run_call(invoker, params, ctx, timeout))
      })
      .collect();

    let settled = futures::future::join_all(handles).await;

    let mut succeeded = 0;
    let mut failed = 0;
    for (name, joined) in names.iter().zip(settled) {
      let outcome = joined.unwrap_or_else(|e| {
        if e.is_panic() {
          Err(CallError::panicked(panic_message(e.into_panic())))
        } else {
          Err(CallError::failed(format!("task join error: {e}")))
        }
      });

      let method = batch
        .get(name)
        .map(|call| call.method.clone())
        .unwrap_or_default();
      match &outcome {
        Ok(_) => {
          succeeded += 1;
          self.notifier.notify(ExecutionEvent::CallCompleted {
            batch_id: batch_id.to_string(),
            call: name.clone(),
            method,
          });
        }
        Err(e) => {
          failed += 1;
          self.notifier.notify(ExecutionEvent::CallFailed {
            batch_id: batch_id.to_string(),
            call: name.clone(),
            method,
            error: e.to_string(),
          });
        }
      }

      if !results.insert(name.clone(), outcome) {
        warn!(call = %name, "duplicate result ignored");
      }
    }

    info!(succeeded, failed, "stage_completed");
    (succeeded, failed)
  }

  fn call_context(
    &self,
    batch_id: &str,
    stage: usize,
    name: &str,
    batch: &BatchDef,
    request: &Arc<RequestContext>,
    results: &ResultMapping,
  ) -> CallContext {
    let (method, dependencies) = match batch.get(name) {
      Some(call) => (
        call.method.clone(),
        call
          .dependencies
          .iter()
          .filter_map(|dep| results.get(dep).map(|outcome| (dep.clone(), outcome.clone())))
          .collect(),
      ),
      None => (String::new(), BTreeMap::new()),
    };

    CallContext {
      batch_id: batch_id.to_string(),
      call: name.to_string(),
      method,
      stage,
      request: request.clone(),
      dependencies,
    }
  }
}

/// Resolve and invoke one sub-call, turning every failure into an outcome.
async fn run_call<I: MethodInvoker>(
  invoker: Arc<I>,
  params: serde_json::Value,
  ctx: CallContext,
  timeout: Option<Duration>,
) -> CallOutcome {
  let span = info_span!(
    "call_execute",
    batch_id = %ctx.batch_id,
    call = %ctx.call,
    method = %ctx.method,
    stage = ctx.stage,
  );

  async move {
    let Some(handle) = invoker.resolve(&ctx.method) else {
      let err = CallError::method_not_found(&ctx.method);
      error!(error = %err, "call_failed");
      return Err(err);
    };

    info!(params = %params, "call_started");

    let call = invoker.call(&handle, params, &ctx);
    let outcome = match timeout {
      Some(limit) => tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(CallError::timed_out(limit))),
      None => call.await,
    };

    match &outcome {
      Ok(value) => info!(output = %value, "call_completed"),
      Err(e) => error!(error = %e, "call_failed"),
    }
    outcome
  }
  .instrument(span)
  .await
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    format!("method panicked: {message}")
  } else if let Some(message) = payload.downcast_ref::<String>() {
    format!("method panicked: {message}")
  } else {
    "method panicked".to_string()
  }
}
