use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// A single named sub-call inside a batch document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDef {
  /// Fully-qualified name of the target method, e.g. "users.get".
  ///
  /// A missing method deserializes as an empty string and is rejected by
  /// validation rather than by the parser.
  #[serde(default)]
  pub method: String,

  /// Parameters handed verbatim to the target method.
  #[serde(default)]
  pub params: serde_json::Value,

  /// Names of sub-calls that must settle before this one runs.
  #[serde(default, deserialize_with = "null_as_empty")]
  pub dependencies: BTreeSet<String>,
}

impl CallDef {
  /// Create a sub-call with no parameters and no dependencies.
  pub fn new(method: impl Into<String>) -> Self {
    Self {
      method: method.into(),
      params: serde_json::Value::Null,
      dependencies: BTreeSet::new(),
    }
  }

  /// Set the parameters passed to the method.
  pub fn with_params(mut self, params: serde_json::Value) -> Self {
    self.params = params;
    self
  }

  /// Add dependencies on other sub-calls.
  pub fn depends_on<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.dependencies.extend(names.into_iter().map(Into::into));
    self
  }

  /// Sorted dependency names joined into a single key.
  ///
  /// Sub-calls with identical dependency sets share the same signature.
  pub fn signature(&self) -> String {
    self
      .dependencies
      .iter()
      .map(String::as_str)
      .collect::<Vec<_>>()
      .join(",")
  }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_defaults_when_fields_missing() {
    let call: CallDef = serde_json::from_value(json!({})).unwrap();
    assert_eq!(call.method, "");
    assert_eq!(call.params, serde_json::Value::Null);
    assert!(call.dependencies.is_empty());
  }

  #[test]
  fn test_null_dependencies_become_empty() {
    let call: CallDef =
      serde_json::from_value(json!({ "method": "m.x", "dependencies": null })).unwrap();
    assert!(call.dependencies.is_empty());
  }

  #[test]
  fn test_signature_is_sorted() {
    let call = CallDef::new("m.x").depends_on(["c", "a", "b"]);
    assert_eq!(call.signature(), "a,b,c");
    assert_eq!(CallDef::new("m.y").signature(), "");
  }

  #[test]
  fn test_params_kept_verbatim() {
    let call: CallDef = serde_json::from_value(json!({
      "method": "m.x",
      "params": { "nested": [1, 2, { "deep": true }] }
    }))
    .unwrap();
    assert_eq!(call.params, json!({ "nested": [1, 2, { "deep": true }] }));
  }
}
