use thiserror::Error;

/// A glob pattern that could not be compiled.
#[derive(Debug, Error)]
#[error("invalid method pattern '{pattern}': {source}")]
pub struct PatternError {
  pub pattern: String,
  #[source]
  pub source: regex::Error,
}

/// Reasons a batch is refused before execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  /// The batch is empty, malformed, or structurally unsound.
  #[error("invalid request body: {0}")]
  InvalidRequestBody(String),

  /// More sub-calls than the policy allows.
  #[error("max requests exceeded: {count} sub-calls submitted, limit is {max}")]
  MaxRequestsExceeded { count: usize, max: usize },

  /// A referenced method is not permitted by the allow/deny policy.
  #[error("forbidden request: method '{method}' is not permitted")]
  ForbiddenRequest { method: String },
}

impl ValidationError {
  pub(crate) fn invalid(message: impl Into<String>) -> Self {
    Self::InvalidRequestBody(message.into())
  }
}
