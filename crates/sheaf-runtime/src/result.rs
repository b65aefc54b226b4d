//! Result mapping and response assembly.

use std::collections::HashMap;

use serde_json::json;
use sheaf_config::{BatchDef, DocumentShape};

use crate::error::CallError;

/// Settled outcome of one sub-call.
pub type CallOutcome = Result<serde_json::Value, CallError>;

/// Outcome of every sub-call in a batch, keyed by sub-call name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMapping {
  outcomes: HashMap<String, CallOutcome>,
}

impl ResultMapping {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record an outcome. Each name is written once; a second write for the
  /// same name is ignored and reported as `false`.
  pub fn insert(&mut self, name: impl Into<String>, outcome: CallOutcome) -> bool {
    match self.outcomes.entry(name.into()) {
      std::collections::hash_map::Entry::Occupied(_) => false,
      std::collections::hash_map::Entry::Vacant(slot) => {
        slot.insert(outcome);
        true
      }
    }
  }

  pub fn get(&self, name: &str) -> Option<&CallOutcome> {
    self.outcomes.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.outcomes.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.outcomes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outcomes.is_empty()
  }

  /// Number of sub-calls that returned a value.
  pub fn succeeded(&self) -> usize {
    self.outcomes.values().filter(|o| o.is_ok()).count()
  }

  /// Number of sub-calls that failed.
  pub fn failed(&self) -> usize {
    self.outcomes.values().filter(|o| o.is_err()).count()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &CallOutcome)> {
    self.outcomes.iter().map(|(name, outcome)| (name.as_str(), outcome))
  }
}

/// The JSON value a sub-call contributes to the response.
///
/// Successful calls contribute their value; failed calls contribute
/// `{"error": {"kind": ..., "message": ..., "data": ...}}`.
pub fn outcome_value(outcome: &CallOutcome) -> serde_json::Value {
  match outcome {
    Ok(value) => value.clone(),
    Err(err) => json!({ "error": err }),
  }
}

/// Project a result mapping onto the batch's submission order and shape.
///
/// Object batches produce an object with keys in submission order; array
/// batches produce an array in positional order.
///
/// Values are emitted verbatim, so a method that succeeds with an object
/// holding an `"error"` key is indistinguishable in the output from a failed
/// sub-call. Callers that need the distinction should read the
/// [`ResultMapping`] instead, where failures are `Err`.
pub fn assemble(results: &ResultMapping, batch: &BatchDef) -> serde_json::Value {
  let values = batch.names().map(|name| {
    let value = match results.get(name) {
      Some(outcome) => outcome_value(outcome),
      None => outcome_value(&Err(CallError::failed("sub-call produced no result"))),
    };
    (name, value)
  });

  match batch.shape() {
    DocumentShape::Object => serde_json::Value::Object(
      values
        .map(|(name, value)| (name.to_string(), value))
        .collect(),
    ),
    DocumentShape::Array => serde_json::Value::Array(values.map(|(_, value)| value).collect()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;
  use sheaf_config::CallDef;

  fn object_batch() -> BatchDef {
    BatchDef::object([
      ("zeta", CallDef::new("m.z")),
      ("alpha", CallDef::new("m.a")),
      ("mid", CallDef::new("m.m")),
    ])
  }

  #[test]
  fn test_insert_is_write_once() {
    let mut results = ResultMapping::new();
    assert!(results.insert("a", Ok(json!(1))));
    assert!(!results.insert("a", Ok(json!(2))));
    assert_eq!(results.get("a"), Some(&Ok(json!(1))));
  }

  #[test]
  fn test_assemble_object_in_submission_order() {
    let mut results = ResultMapping::new();
    results.insert("mid", Ok(json!("m")));
    results.insert("alpha", Ok(json!("a")));
    results.insert("zeta", Ok(json!("z")));

    let output = assemble(&results, &object_batch());
    let keys: Vec<&String> = output.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["zeta", "alpha", "mid"]);
    assert_eq!(output, json!({ "zeta": "z", "alpha": "a", "mid": "m" }));
  }

  #[test]
  fn test_assemble_array_in_positional_order() {
    let batch = BatchDef::array([CallDef::new("m.a"), CallDef::new("m.b"), CallDef::new("m.c")]);
    let mut results = ResultMapping::new();
    results.insert("2", Ok(json!("c")));
    results.insert("0", Ok(json!("a")));
    results.insert("1", Err(CallError::failed("nope")));

    let output = assemble(&results, &batch);
    assert_eq!(
      output,
      json!(["a", { "error": { "kind": "failed", "message": "nope" } }, "c"])
    );
  }

  #[test]
  fn test_assemble_is_idempotent() {
    let mut results = ResultMapping::new();
    results.insert("alpha", Ok(json!(1)));
    results.insert("zeta", Err(CallError::method_not_found("m.z")));
    results.insert("mid", Ok(json!(null)));

    let batch = object_batch();
    let first = assemble(&results, &batch);
    let second = assemble(&results, &batch);
    assert_eq!(first, second);
    assert_eq!(
      serde_json::to_string(&first).unwrap(),
      serde_json::to_string(&second).unwrap()
    );
  }

  #[test]
  fn test_assemble_missing_result_becomes_error() {
    let output = assemble(&ResultMapping::new(), &object_batch());
    assert_eq!(output["alpha"]["error"]["kind"], "failed");
  }

  #[test]
  fn test_counts() {
    let mut results = ResultMapping::new();
    results.insert("a", Ok(json!(1)));
    results.insert("b", Err(CallError::failed("x")));
    results.insert("c", Ok(json!(3)));
    assert_eq!(results.len(), 3);
    assert_eq!(results.succeeded(), 2);
    assert_eq!(results.failed(), 1);
  }

  #[test]
  fn test_error_shaped_success_is_emitted_verbatim() {
    let batch = BatchDef::object([("ok", CallDef::new("m.ok")), ("bad", CallDef::new("m.bad"))]);
    let mut results = ResultMapping::new();
    results.insert("ok", Ok(json!({ "error": "not really" })));
    results.insert("bad", Err(CallError::failed("boom")));

    let output = assemble(&results, &batch);
    assert_eq!(output["ok"], json!({ "error": "not really" }));
    assert_eq!(output["bad"]["error"]["kind"], "failed");
    assert_eq!(results.succeeded(), 1);
    assert_eq!(results.failed(), 1);
  }

  proptest! {
    #[test]
    fn test_assemble_keeps_shape_and_order(count in 1usize..24, array in any::<bool>()) {
      let calls = (0..count).map(|i| CallDef::new(format!("m.{i}")));
      let batch = if array {
        BatchDef::array(calls)
      } else {
        BatchDef::object(calls.enumerate().map(|(i, call)| (format!("k{}", count - i), call)))
      };

      let mut results = ResultMapping::new();
      for name in batch.names().collect::<Vec<_>>().into_iter().rev() {
        results.insert(name, Ok(json!(name)));
      }

      let output = assemble(&results, &batch);
      let names: Vec<&str> = batch.names().collect();
      if array {
        let items = output.as_array().unwrap();
        prop_assert_eq!(items.len(), count);
        for (item, name) in items.iter().zip(&names) {
          prop_assert_eq!(item, &json!(name));
        }
      } else {
        let keys: Vec<&str> = output.as_object().unwrap().keys().map(String::as_str).collect();
        prop_assert_eq!(keys, names);
      }
      prop_assert_eq!(assemble(&results, &batch), output);
    }
  }
}
