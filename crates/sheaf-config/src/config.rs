//! Orchestrator configuration.
//!
//! Read once at startup and immutable afterwards. Every field has a default,
//! so an empty JSON object is a valid configuration:
//!
//! ```json
//! {
//!   "max_calls": 10,
//!   "allow": ["users.*", "posts.?et"],
//!   "deny": ["internal.*"],
//!   "grouping": "leveled",
//!   "call_timeout_ms": 5000,
//!   "entry": { "name": "batch", "path": "/batch", "verb": "POST" }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default ceiling on the number of sub-calls in one batch.
pub const DEFAULT_MAX_CALLS: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_json::Error,
  },
}

/// How sub-calls are grouped into execution stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
  /// Each sub-call runs one stage after its deepest dependency.
  #[default]
  Leveled,
  /// Sub-calls sharing an identical dependency set share a stage.
  Signature,
}

/// Describes the orchestrator's own entry point for the host to mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryPoint {
  /// Method name the orchestrator is registered under.
  pub name: String,
  /// Route path.
  pub path: String,
  /// Route verb.
  pub verb: String,
}

impl Default for EntryPoint {
  fn default() -> Self {
    Self {
      name: "batch".to_string(),
      path: "/batch".to_string(),
      verb: "POST".to_string(),
    }
  }
}

/// Process-wide orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
  /// Maximum number of sub-calls per batch.
  pub max_calls: usize,
  /// Method-name glob patterns that may be called. Empty allows everything.
  pub allow: Vec<String>,
  /// Method-name glob patterns that may never be called. Wins over `allow`.
  pub deny: Vec<String>,
  /// Stage grouping strategy.
  pub grouping: GroupingStrategy,
  /// Per-call timeout applied around each method invocation.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub call_timeout_ms: Option<u64>,
  /// Entry point descriptor.
  pub entry: EntryPoint,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      max_calls: DEFAULT_MAX_CALLS,
      allow: Vec::new(),
      deny: Vec::new(),
      grouping: GroupingStrategy::default(),
      call_timeout_ms: None,
      entry: EntryPoint::default(),
    }
  }
}

impl OrchestratorConfig {
  /// Load a configuration from a JSON file.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.display().to_string(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.display().to_string(),
      source,
    })
  }
}
