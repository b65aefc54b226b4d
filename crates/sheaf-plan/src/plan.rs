//! Dependency grouping into execution stages.
//!
//! Every sub-call in a stage may run concurrently and depends only on
//! sub-calls in strictly earlier stages. Two strategies are available:
//!
//! - [`GroupingStrategy::Leveled`]: a sub-call's stage is one past the stage of
//!   its deepest dependency. Independent work always shares a stage.
//! - [`GroupingStrategy::Signature`]: sub-calls with an identical dependency set
//!   share a stage. Kept for staging compatibility with older deployments; it
//!   can split independent sub-calls into separate stages.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sheaf_config::{BatchDef, GroupingStrategy};
use tracing::debug;

use crate::graph::Graph;

/// A set of sub-call names that may execute concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage {
  calls: Vec<String>,
}

impl Stage {
  pub fn new(calls: Vec<String>) -> Self {
    Self { calls }
  }

  /// Sub-call names in this stage.
  pub fn calls(&self) -> &[String] {
    &self.calls
  }

  pub fn len(&self) -> usize {
    self.calls.len()
  }

  pub fn is_empty(&self) -> bool {
    self.calls.is_empty()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.calls.iter().any(|c| c == name)
  }
}

/// Ordered stages covering every sub-call of a batch exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
  pub strategy: GroupingStrategy,
  pub stages: Vec<Stage>,
}

impl ExecutionPlan {
  /// Number of stages.
  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  /// Total number of sub-calls across all stages.
  pub fn call_count(&self) -> usize {
    self.stages.iter().map(Stage::len).sum()
  }

  /// Index of the stage containing `name`.
  pub fn stage_of(&self, name: &str) -> Option<usize> {
    self.stages.iter().position(|stage| stage.contains(name))
  }

  /// Iterate stages in execution order.
  pub fn iter(&self) -> impl Iterator<Item = &Stage> {
    self.stages.iter()
  }
}

/// Group a validated batch into an execution plan.
///
/// Total for any batch: sub-calls whose dependencies cannot be ordered (a
/// cycle the validator would have rejected) still land in some stage.
pub fn group(batch: &BatchDef, strategy: GroupingStrategy) -> ExecutionPlan {
  let graph = Graph::new(batch);
  let stages = match strategy {
    GroupingStrategy::Leveled => group_leveled(batch, &graph),
    GroupingStrategy::Signature => group_by_signature(batch, &graph),
  };

  debug!(
    strategy = ?strategy,
    calls = batch.len(),
    stages = stages.len(),
    "batch_grouped"
  );

  ExecutionPlan { strategy, stages }
}

fn group_leveled(batch: &BatchDef, graph: &Graph) -> Vec<Stage> {
  let depths = graph.depths();
  let stage_count = depths.values().max().map_or(0, |d| d + 1);

  let mut stages: Vec<Vec<String>> = vec![Vec::new(); stage_count];
  for name in batch.names() {
    stages[depths[name]].push(name.to_string());
  }

  stages
    .into_iter()
    .filter(|calls| !calls.is_empty())
    .map(|mut calls| {
      calls.sort();
      Stage::new(calls)
    })
    .collect()
}

fn group_by_signature(batch: &BatchDef, graph: &Graph) -> Vec<Stage> {
  let depths = graph.depths();

  // Fewer dependencies first, then depended-upon sub-calls, then shallower
  // sub-calls, then descending name.
  let mut ordered: Vec<(&str, usize)> = batch
    .iter()
    .map(|(name, call)| (name, call.dependencies.len()))
    .collect();
  ordered.sort_by(|(a, a_count), (b, b_count)| {
    a_count
      .cmp(b_count)
      .then_with(|| graph.is_depended_upon(b).cmp(&graph.is_depended_upon(a)))
      .then_with(|| depths[*a].cmp(&depths[*b]))
      .then_with(|| b.cmp(a))
  });

  // Bucket by dependency signature, in order of first appearance.
  let mut buckets: Vec<Vec<String>> = Vec::new();
  let mut bucket_of_signature: HashMap<String, usize> = HashMap::new();
  let mut bucket_of_call: HashMap<&str, usize> = HashMap::new();
  for (name, _) in &ordered {
    let signature = batch.get(name).map(|call| call.signature()).unwrap_or_default();
    let index = *bucket_of_signature.entry(signature).or_insert_with(|| {
      buckets.push(Vec::new());
      buckets.len() - 1
    });
    buckets[index].push(name.to_string());
    bucket_of_call.insert(*name, index);
  }

  let order = order_buckets(&buckets, &bucket_of_call, graph);
  let mut slots: Vec<Option<Vec<String>>> = buckets.into_iter().map(Some).collect();
  order
    .into_iter()
    .filter_map(|index| slots[index].take())
    .map(Stage::new)
    .collect()
}

/// Order buckets so each comes after every bucket it depends on, preferring
/// first-appearance order whenever there is a choice.
fn order_buckets(
  buckets: &[Vec<String>],
  bucket_of_call: &HashMap<&str, usize>,
  graph: &Graph,
) -> Vec<usize> {
  let upstream: Vec<HashSet<usize>> = buckets
    .iter()
    .enumerate()
    .map(|(index, calls)| {
      calls
        .iter()
        .flat_map(|name| graph.upstream(name))
        .filter_map(|dep| bucket_of_call.get(dep.as_str()).copied())
        .filter(|&dep_bucket| dep_bucket != index)
        .collect()
    })
    .collect();

  let mut remaining: Vec<usize> = upstream.iter().map(HashSet::len).collect();
  let mut ready: BTreeSet<usize> = (0..buckets.len())
    .filter(|&index| remaining[index] == 0)
    .collect();
  let mut order = Vec::with_capacity(buckets.len());
  let mut placed = vec![false; buckets.len()];

  while let Some(index) = ready.pop_first() {
    order.push(index);
    placed[index] = true;
    for (other, deps) in upstream.iter().enumerate() {
      if !placed[other] && deps.contains(&index) {
        remaining[other] -= 1;
        if remaining[other] == 0 {
          ready.insert(other);
        }
      }
    }
  }

  // Buckets stuck behind a cycle keep their first-appearance order.
  order.extend((0..buckets.len()).filter(|&index| !placed[index]));
  order
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use sheaf_config::CallDef;

  fn stages(plan: &ExecutionPlan) -> Vec<Vec<&str>> {
    plan
      .iter()
      .map(|stage| stage.calls().iter().map(String::as_str).collect())
      .collect()
  }

  /// Every dependency lies in a strictly earlier stage, and every sub-call
  /// appears exactly once.
  fn assert_valid(plan: &ExecutionPlan, batch: &BatchDef) {
    assert_eq!(plan.call_count(), batch.len());
    for (name, call) in batch.iter() {
      let stage = plan.stage_of(name).expect("sub-call missing from plan");
      for dep in &call.dependencies {
        let dep_stage = plan.stage_of(dep).expect("dependency missing from plan");
        assert!(
          dep_stage < stage,
          "{dep} (stage {dep_stage}) must precede {name} (stage {stage})"
        );
      }
    }
  }

  fn both(batch: &BatchDef) -> [ExecutionPlan; 2] {
    let plans = [
      group(batch, GroupingStrategy::Leveled),
      group(batch, GroupingStrategy::Signature),
    ];
    for plan in &plans {
      assert_valid(plan, batch);
    }
    plans
  }

  #[test]
  fn test_two_stage_chain() {
    let batch = BatchDef::from_value(json!({
      "a": { "method": "m.x", "dependencies": [] },
      "b": { "method": "m.y", "dependencies": ["a"] }
    }))
    .unwrap();

    for plan in both(&batch) {
      assert_eq!(stages(&plan), [vec!["a"], vec!["b"]]);
    }
  }

  #[test]
  fn test_independent_calls_share_a_stage() {
    let batch = BatchDef::object([
      ("c", CallDef::new("m")),
      ("a", CallDef::new("m")),
      ("b", CallDef::new("m")),
    ]);

    let [leveled, signature] = both(&batch);
    assert_eq!(stages(&leveled), [vec!["a", "b", "c"]]);
    assert_eq!(stages(&signature), [vec!["c", "b", "a"]]);
  }

  #[test]
  fn test_diamond() {
    let batch = BatchDef::object([
      ("root", CallDef::new("m")),
      ("left", CallDef::new("m").depends_on(["root"])),
      ("right", CallDef::new("m").depends_on(["root"])),
      ("join", CallDef::new("m").depends_on(["left", "right"])),
    ]);

    let [leveled, signature] = both(&batch);
    assert_eq!(
      stages(&leveled),
      [vec!["root"], vec!["left", "right"], vec!["join"]]
    );
    assert_eq!(
      stages(&signature),
      [vec!["root"], vec!["right", "left"], vec!["join"]]
    );
  }

  #[test]
  fn test_signature_serializes_independent_branches() {
    // c and d are independent of each other but wait on different sub-calls.
    let batch = BatchDef::object([
      ("a", CallDef::new("m")),
      ("b", CallDef::new("m")),
      ("c", CallDef::new("m").depends_on(["a"])),
      ("d", CallDef::new("m").depends_on(["b"])),
    ]);

    let [leveled, signature] = both(&batch);
    assert_eq!(stages(&leveled), [vec!["a", "b"], vec!["c", "d"]]);
    assert_eq!(stages(&signature), [vec!["b", "a"], vec!["d"], vec!["c"]]);
  }

  #[test]
  fn test_signature_reorders_buckets_to_respect_dependencies() {
    // y has fewer dependencies than x but depends on it.
    let batch = BatchDef::object([
      ("a", CallDef::new("m")),
      ("b", CallDef::new("m")),
      ("x", CallDef::new("m").depends_on(["a", "b"])),
      ("y", CallDef::new("m").depends_on(["x"])),
    ]);

    let [leveled, signature] = both(&batch);
    assert_eq!(stages(&leveled), [vec!["a", "b"], vec!["x"], vec!["y"]]);
    assert_eq!(stages(&signature), [vec!["b", "a"], vec!["x"], vec!["y"]]);
  }

  #[test]
  fn test_signature_puts_depended_upon_calls_first() {
    let batch = BatchDef::object([
      ("a", CallDef::new("m")),
      ("b", CallDef::new("m")),
      ("c", CallDef::new("m").depends_on(["a"])),
    ]);

    let [_, signature] = both(&batch);
    assert_eq!(stages(&signature), [vec!["a", "b"], vec!["c"]]);
  }

  #[test]
  fn test_leveled_uses_longest_path() {
    let batch = BatchDef::object([
      ("a", CallDef::new("m")),
      ("b", CallDef::new("m").depends_on(["a"])),
      ("c", CallDef::new("m").depends_on(["a", "b"])),
      ("d", CallDef::new("m")),
    ]);

    let [leveled, _] = both(&batch);
    assert_eq!(stages(&leveled), [vec!["a", "d"], vec!["b"], vec!["c"]]);
  }

  #[test]
  fn test_wide_and_deep_batch_is_valid() {
    let mut calls = Vec::new();
    for i in 0..20 {
      let mut call = CallDef::new("m");
      if i >= 2 {
        call = call.depends_on([format!("n{}", i - 2), format!("n{}", i / 3)]);
      }
      if i % 5 == 4 {
        call = call.depends_on([format!("n{}", i - 1)]);
      }
      calls.push((format!("n{i}"), call));
    }
    let batch = BatchDef::object(calls);

    let [leveled, signature] = both(&batch);
    assert!(leveled.len() <= signature.len());
  }

  #[test]
  fn test_array_names() {
    let batch = BatchDef::from_value(json!([
      { "method": "m.a" },
      { "method": "m.b", "dependencies": ["0"] },
      { "method": "m.c" }
    ]))
    .unwrap();

    let [leveled, _] = both(&batch);
    assert_eq!(stages(&leveled), [vec!["0", "2"], vec!["1"]]);
  }

  #[test]
  fn test_grouping_is_deterministic() {
    let batch = BatchDef::object([
      ("q", CallDef::new("m")),
      ("r", CallDef::new("m").depends_on(["q"])),
      ("s", CallDef::new("m").depends_on(["q"])),
      ("t", CallDef::new("m")),
    ]);
    for strategy in [GroupingStrategy::Leveled, GroupingStrategy::Signature] {
      assert_eq!(group(&batch, strategy), group(&batch, strategy));
    }
  }

  #[test]
  fn test_cycle_still_total() {
    let batch = BatchDef::object([
      ("a", CallDef::new("m")),
      ("b", CallDef::new("m").depends_on(["c"])),
      ("c", CallDef::new("m").depends_on(["b"])),
    ]);
    for strategy in [GroupingStrategy::Leveled, GroupingStrategy::Signature] {
      assert_eq!(group(&batch, strategy).call_count(), 3);
    }
  }

  #[test]
  fn test_plan_serializes_as_nested_arrays() {
    let batch = BatchDef::object([
      ("a", CallDef::new("m")),
      ("b", CallDef::new("m").depends_on(["a"])),
    ]);
    let plan = group(&batch, GroupingStrategy::Leveled);
    assert_eq!(
      serde_json::to_value(&plan).unwrap(),
      json!({ "strategy": "leveled", "stages": [["a"], ["b"]] })
    );
  }
}
