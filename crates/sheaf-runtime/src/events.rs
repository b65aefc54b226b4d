//! Execution events and notifiers for observability.
//!
//! Events are emitted while a batch is handled so consumers can observe
//! progress, record audit trails, feed metrics, etc.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted while handling a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// The batch was refused before anything ran.
  BatchRejected {
    batch_id: String,
    request_id: String,
    status: u16,
    error: String,
  },

  /// The batch was admitted and planned.
  BatchStarted {
    batch_id: String,
    request_id: String,
    calls: usize,
    stages: usize,
  },

  /// A stage is about to run.
  StageStarted {
    batch_id: String,
    stage: usize,
    calls: Vec<String>,
  },

  /// A sub-call returned a value.
  CallCompleted {
    batch_id: String,
    call: String,
    method: String,
  },

  /// A sub-call failed; the failure is recorded as its result.
  CallFailed {
    batch_id: String,
    call: String,
    method: String,
    error: String,
  },

  /// Every sub-call of a stage has settled.
  StageCompleted {
    batch_id: String,
    stage: usize,
    succeeded: usize,
    failed: usize,
  },

  /// Every stage has settled.
  BatchCompleted {
    batch_id: String,
    succeeded: usize,
    failed: usize,
  },
}

/// Trait for receiving execution events.
///
/// The orchestrator calls `notify` for each event; implementations decide
/// what to do with them (persist, broadcast, log, ignore, etc.).
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a stage barrier. Volume is a
  // handful of events per sub-call.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
