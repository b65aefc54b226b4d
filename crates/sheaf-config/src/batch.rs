use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::call::CallDef;

/// Errors raised while turning a raw request body into a [`BatchDef`].
#[derive(Debug, Error)]
pub enum DocumentError {
  #[error("request body is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("batch must be an object or an array of sub-calls, got {found}")]
  NotACollection { found: &'static str },

  #[error("sub-call '{name}' is malformed: {message}")]
  InvalidCall { name: String, message: String },
}

/// The shape a batch document was submitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentShape {
  /// Keyed by sub-call name.
  Object,
  /// Ordered list; keys are the positional indices.
  Array,
}

/// A parsed batch document.
///
/// Sub-calls keep the order they were submitted in, which is also the
/// order the response is assembled in.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDef {
  shape: DocumentShape,
  calls: Vec<(String, CallDef)>,
  index: HashMap<String, usize>,
}

impl BatchDef {
  /// Build a batch from named sub-calls.
  ///
  /// A repeated name replaces the earlier definition but keeps its position,
  /// matching how a JSON object with duplicate keys is read.
  pub fn new<I, S>(shape: DocumentShape, calls: I) -> Self
  where
    I: IntoIterator<Item = (S, CallDef)>,
    S: Into<String>,
  {
    let mut batch = Self {
      shape,
      calls: Vec::new(),
      index: HashMap::new(),
    };
    for (name, call) in calls {
      batch.insert(name.into(), call);
    }
    batch
  }

  /// Build an object-shaped batch.
  pub fn object<I, S>(calls: I) -> Self
  where
    I: IntoIterator<Item = (S, CallDef)>,
    S: Into<String>,
  {
    Self::new(DocumentShape::Object, calls)
  }

  /// Build an array-shaped batch; names are the positional indices.
  pub fn array<I>(calls: I) -> Self
  where
    I: IntoIterator<Item = CallDef>,
  {
    Self::new(
      DocumentShape::Array,
      calls
        .into_iter()
        .enumerate()
        .map(|(i, call)| (i.to_string(), call)),
    )
  }

  /// Parse a raw request body.
  pub fn from_slice(body: &[u8]) -> Result<Self, DocumentError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    Self::from_value(value)
  }

  /// Interpret an already-decoded JSON value as a batch document.
  pub fn from_value(value: serde_json::Value) -> Result<Self, DocumentError> {
    match value {
      serde_json::Value::Object(map) => {
        let calls = map
          .into_iter()
          .map(|(name, entry)| parse_call(&name, entry).map(|call| (name, call)))
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::object(calls))
      }
      serde_json::Value::Array(items) => {
        let calls = items
          .into_iter()
          .enumerate()
          .map(|(i, entry)| parse_call(&i.to_string(), entry))
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::array(calls))
      }
      other => Err(DocumentError::NotACollection {
        found: json_type_name(&other),
      }),
    }
  }

  /// The shape the document was submitted in.
  pub fn shape(&self) -> DocumentShape {
    self.shape
  }

  /// Number of sub-calls.
  pub fn len(&self) -> usize {
    self.calls.len()
  }

  /// Whether the batch has no sub-calls.
  pub fn is_empty(&self) -> bool {
    self.calls.is_empty()
  }

  /// Look up a sub-call by name.
  pub fn get(&self, name: &str) -> Option<&CallDef> {
    self.index.get(name).map(|&i| &self.calls[i].1)
  }

  /// Whether a sub-call with this name exists.
  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  /// Submission position of a sub-call.
  pub fn position(&self, name: &str) -> Option<usize> {
    self.index.get(name).copied()
  }

  /// Iterate sub-calls in submission order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &CallDef)> {
    self.calls.iter().map(|(name, call)| (name.as_str(), call))
  }

  /// Sub-call names in submission order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.calls.iter().map(|(name, _)| name.as_str())
  }

  fn insert(&mut self, name: String, call: CallDef) {
    match self.index.get(&name) {
      Some(&i) => self.calls[i].1 = call,
      None => {
        self.index.insert(name.clone(), self.calls.len());
        self.calls.push((name, call));
      }
    }
  }
}

fn parse_call(name: &str, entry: serde_json::Value) -> Result<CallDef, DocumentError> {
  if !entry.is_object() {
    return Err(DocumentError::InvalidCall {
      name: name.to_string(),
      message: format!("expected an object, got {}", json_type_name(&entry)),
    });
  }
  serde_json::from_value(entry).map_err(|e| DocumentError::InvalidCall {
    name: name.to_string(),
    message: e.to_string(),
  })
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
  match value {
    serde_json::Value::Null => "null",
    serde_json::Value::Bool(_) => "boolean",
    serde_json::Value::Number(_) => "number",
    serde_json::Value::String(_) => "string",
    serde_json::Value::Array(_) => "array",
    serde_json::Value::Object(_) => "object",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_object_preserves_key_order() {
    let batch = BatchDef::from_value(json!({
      "zeta": { "method": "m.z" },
      "alpha": { "method": "m.a" },
      "mid": { "method": "m.m", "dependencies": ["alpha"] }
    }))
    .unwrap();

    assert_eq!(batch.shape(), DocumentShape::Object);
    assert_eq!(batch.names().collect::<Vec<_>>(), ["zeta", "alpha", "mid"]);
    assert_eq!(batch.position("mid"), Some(2));
    assert!(batch.get("mid").unwrap().dependencies.contains("alpha"));
  }

  #[test]
  fn test_array_synthesizes_index_keys() {
    let batch = BatchDef::from_value(json!([
      { "method": "m.a" },
      { "method": "m.b", "dependencies": ["0"] }
    ]))
    .unwrap();

    assert_eq!(batch.shape(), DocumentShape::Array);
    assert_eq!(batch.names().collect::<Vec<_>>(), ["0", "1"]);
    assert_eq!(batch.get("1").unwrap().method, "m.b");
  }

  #[test]
  fn test_empty_object_parses() {
    let batch = BatchDef::from_slice(b"{}").unwrap();
    assert!(batch.is_empty());
  }

  #[test]
  fn test_scalar_body_rejected() {
    let err = BatchDef::from_value(json!("nope")).unwrap_err();
    assert!(matches!(
      err,
      DocumentError::NotACollection { found: "string" }
    ));
  }

  #[test]
  fn test_non_object_entry_rejected() {
    let err = BatchDef::from_value(json!({ "a": 42 })).unwrap_err();
    match err {
      DocumentError::InvalidCall { name, .. } => assert_eq!(name, "a"),
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn test_bad_json_rejected() {
    assert!(matches!(
      BatchDef::from_slice(b"{ not json"),
      Err(DocumentError::Json(_))
    ));
  }

  #[test]
  fn test_duplicate_name_keeps_first_position() {
    let batch = BatchDef::object([
      ("a", CallDef::new("m.first")),
      ("b", CallDef::new("m.b")),
      ("a", CallDef::new("m.second")),
    ]);
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.position("a"), Some(0));
    assert_eq!(batch.get("a").unwrap().method, "m.second");
  }
}
