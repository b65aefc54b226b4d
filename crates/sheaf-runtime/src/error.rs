//! Runtime errors.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sheaf_config::DocumentError;
use sheaf_plan::{PatternError, ValidationError};

/// Category of a per-call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
  /// The invoker does not know the method.
  MethodNotFound,
  /// The method ran and returned an error.
  Failed,
  /// The method did not settle within the configured call timeout.
  TimedOut,
  /// The method panicked.
  Panicked,
}

impl CallErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::MethodNotFound => "method_not_found",
      Self::Failed => "failed",
      Self::TimedOut => "timed_out",
      Self::Panicked => "panicked",
    }
  }
}

impl fmt::Display for CallErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Failure of a single sub-call.
///
/// Never fails the batch; it is stored as the sub-call's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CallError {
  pub kind: CallErrorKind,
  pub message: String,
  /// Optional structured detail supplied by the method.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<serde_json::Value>,
}

impl CallError {
  pub fn new(kind: CallErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      data: None,
    }
  }

  /// The method ran and reported an error.
  pub fn failed(message: impl Into<String>) -> Self {
    Self::new(CallErrorKind::Failed, message)
  }

  pub fn method_not_found(method: &str) -> Self {
    Self::new(
      CallErrorKind::MethodNotFound,
      format!("method '{method}' not found"),
    )
  }

  pub fn timed_out(limit: Duration) -> Self {
    Self::new(
      CallErrorKind::TimedOut,
      format!("call did not settle within {}ms", limit.as_millis()),
    )
  }

  pub fn panicked(message: impl Into<String>) -> Self {
    Self::new(CallErrorKind::Panicked, message)
  }

  /// Attach structured detail.
  pub fn with_data(mut self, data: serde_json::Value) -> Self {
    self.data = Some(data);
    self
  }
}

/// Batch-level failure. Nothing in the batch runs when one of the first three
/// kinds is raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
  #[error("invalid request body: {0}")]
  InvalidRequestBody(String),

  #[error("max requests exceeded: {count} sub-calls submitted, limit is {max}")]
  MaxRequestsExceeded { count: usize, max: usize },

  #[error("forbidden request: method '{method}' is not permitted")]
  ForbiddenRequest { method: String },

  /// Unexpected fault while executing an admitted batch.
  #[error("internal error: {0}")]
  Internal(String),
}

impl BatchError {
  /// HTTP-style status classification.
  pub fn status(&self) -> u16 {
    match self {
      Self::InvalidRequestBody(_) => 400,
      Self::ForbiddenRequest { .. } => 403,
      Self::MaxRequestsExceeded { .. } => 413,
      Self::Internal(_) => 500,
    }
  }

  /// Stable machine-readable name of the error kind.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::InvalidRequestBody(_) => "InvalidRequestBody",
      Self::MaxRequestsExceeded { .. } => "MaxRequestsExceeded",
      Self::ForbiddenRequest { .. } => "ForbiddenRequest",
      Self::Internal(_) => "Internal",
    }
  }
}

impl From<ValidationError> for BatchError {
  fn from(err: ValidationError) -> Self {
    match err {
      ValidationError::InvalidRequestBody(message) => Self::InvalidRequestBody(message),
      ValidationError::MaxRequestsExceeded { count, max } => {
        Self::MaxRequestsExceeded { count, max }
      }
      ValidationError::ForbiddenRequest { method } => Self::ForbiddenRequest { method },
    }
  }
}

impl From<DocumentError> for BatchError {
  fn from(err: DocumentError) -> Self {
    Self::InvalidRequestBody(err.to_string())
  }
}

/// Errors raised while building an orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  #[error(transparent)]
  Pattern(#[from] PatternError),

  #[error("max_calls must be at least 1")]
  ZeroMaxCalls,
}
