//! Batch admission checks.
//!
//! Checks run in three groups and stop at the first failing group:
//! 1. structure (methods present, no self, dangling, or cyclic dependencies)
//! 2. cardinality (at least one sub-call, at most `max_calls`)
//! 3. policy (every referenced method passes deny, then allow)

use std::collections::HashSet;

use sheaf_config::BatchDef;
use tracing::debug;

use crate::error::ValidationError;
use crate::graph::Graph;
use crate::policy::Policy;

/// Validate a batch against a policy without running anything.
pub fn validate(batch: &BatchDef, policy: &Policy) -> Result<(), ValidationError> {
  check_structure(batch)?;
  check_cardinality(batch, policy)?;
  check_policy(batch, policy)?;

  debug!(calls = batch.len(), "batch_validated");
  Ok(())
}

fn check_structure(batch: &BatchDef) -> Result<(), ValidationError> {
  for (name, call) in batch.iter() {
    if call.method.trim().is_empty() {
      return Err(ValidationError::invalid(format!(
        "sub-call '{name}' has no method"
      )));
    }
    if call.dependencies.contains(name) {
      return Err(ValidationError::invalid(format!(
        "sub-call '{name}' depends on itself"
      )));
    }
  }

  let graph = Graph::new(batch);
  if let Some((name, missing)) = graph.dangling().first() {
    return Err(ValidationError::invalid(format!(
      "sub-call '{name}' depends on unknown sub-call '{missing}'"
    )));
  }
  if let Some(cycle) = graph.find_cycle() {
    return Err(ValidationError::invalid(format!(
      "dependency cycle: {}",
      cycle.join(" -> ")
    )));
  }

  Ok(())
}

fn check_cardinality(batch: &BatchDef, policy: &Policy) -> Result<(), ValidationError> {
  if batch.is_empty() {
    return Err(ValidationError::invalid("batch contains no sub-calls"));
  }
  if batch.len() > policy.max_calls() {
    return Err(ValidationError::MaxRequestsExceeded {
      count: batch.len(),
      max: policy.max_calls(),
    });
  }
  Ok(())
}

fn check_policy(batch: &BatchDef, policy: &Policy) -> Result<(), ValidationError> {
  let mut seen = HashSet::new();
  let methods: Vec<&str> = batch
    .iter()
    .map(|(_, call)| call.method.as_str())
    .filter(|method| seen.insert(*method))
    .collect();

  // Report a denied method ahead of one that merely misses the allow-list.
  let forbidden = methods
    .iter()
    .find(|method| policy.denies(method))
    .or_else(|| methods.iter().find(|method| !policy.permits(method)));

  match forbidden {
    Some(method) => Err(ValidationError::ForbiddenRequest {
      method: method.to_string(),
    }),
    None => Ok(()),
  }
}
