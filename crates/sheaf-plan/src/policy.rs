//! Compiled admission policy.

use sheaf_config::OrchestratorConfig;

use crate::error::PatternError;
use crate::glob::GlobSet;

/// The immutable, compiled form of the policy configuration.
///
/// Built once at orchestrator construction and shared read-only across
/// concurrent batches.
#[derive(Debug, Clone)]
pub struct Policy {
  max_calls: usize,
  allow: GlobSet,
  deny: GlobSet,
}

impl Policy {
  /// Compile a policy from its parts.
  pub fn new<A, D, S>(max_calls: usize, allow: A, deny: D) -> Result<Self, PatternError>
  where
    A: IntoIterator<Item = S>,
    D: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Ok(Self {
      max_calls,
      allow: GlobSet::new(allow)?,
      deny: GlobSet::new(deny)?,
    })
  }

  /// Compile the policy section of an orchestrator configuration.
  pub fn from_config(config: &OrchestratorConfig) -> Result<Self, PatternError> {
    Self::new(
      config.max_calls,
      config.allow.iter().map(String::as_str),
      config.deny.iter().map(String::as_str),
    )
  }

  /// A policy that admits every method, up to `max_calls` sub-calls.
  pub fn unrestricted(max_calls: usize) -> Self {
    Self {
      max_calls,
      allow: GlobSet::default(),
      deny: GlobSet::default(),
    }
  }

  pub fn max_calls(&self) -> usize {
    self.max_calls
  }

  /// Whether a method matches the deny-list.
  pub fn denies(&self, method: &str) -> bool {
    self.deny.matches(method)
  }

  /// Whether a method may be called. Deny wins; an empty allow-list allows all.
  pub fn permits(&self, method: &str) -> bool {
    if self.denies(method) {
      return false;
    }
    self.allow.is_empty() || self.allow.matches(method)
  }

  /// Filter a method-name universe down to the names this policy permits.
  pub fn permitted<'a, I>(&self, names: I) -> Vec<&'a str>
  where
    I: IntoIterator<Item = &'a str>,
  {
    names.into_iter().filter(|name| self.permits(name)).collect()
  }
}
