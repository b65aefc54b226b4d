//! Property-based tests for validation and grouping over random DAGs.

use proptest::prelude::*;
use proptest::sample::Index;
use sheaf_config::{BatchDef, CallDef, GroupingStrategy};

use crate::plan::group;
use crate::policy::Policy;
use crate::validate::validate;

/// Random acyclic batch: sub-call `n{i}` may only depend on `n{j}` with `j < i`.
/// Submission order is optionally reversed so it does not always match
/// dependency order.
fn dag_strategy() -> impl Strategy<Value = BatchDef> {
  (
    prop::collection::vec(prop::collection::vec(any::<Index>(), 0..4), 1..16),
    any::<bool>(),
  )
    .prop_map(|(edges, reversed)| {
      let mut calls: Vec<(String, CallDef)> = edges
        .iter()
        .enumerate()
        .map(|(i, picks)| {
          let mut call = CallDef::new(format!("m.{}", i % 3));
          if i > 0 {
            call = call.depends_on(picks.iter().map(|pick| format!("n{}", pick.index(i))));
          }
          (format!("n{i}"), call)
        })
        .collect();
      if reversed {
        calls.reverse();
      }
      BatchDef::object(calls)
    })
}

fn strategies() -> [GroupingStrategy; 2] {
  [GroupingStrategy::Leveled, GroupingStrategy::Signature]
}

proptest! {
  #[test]
  fn test_acyclic_batches_are_admitted(batch in dag_strategy()) {
    let policy = Policy::unrestricted(batch.len());
    prop_assert_eq!(validate(&batch, &policy), Ok(()));
  }

  #[test]
  fn test_dependencies_precede_dependents(batch in dag_strategy()) {
    for strategy in strategies() {
      let plan = group(&batch, strategy);
      for (name, call) in batch.iter() {
        let stage = plan.stage_of(name);
        prop_assert!(stage.is_some(), "{} missing under {:?}", name, strategy);
        for dep in &call.dependencies {
          let dep_stage = plan.stage_of(dep);
          prop_assert!(
            dep_stage.is_some() && dep_stage < stage,
            "{} must precede {} under {:?}", dep, name, strategy
          );
        }
      }
    }
  }

  #[test]
  fn test_every_call_planned_once(batch in dag_strategy()) {
    for strategy in strategies() {
      let plan = group(&batch, strategy);
      prop_assert_eq!(plan.call_count(), batch.len());
      prop_assert!(plan.iter().all(|stage| !stage.is_empty()));
    }
  }

  #[test]
  fn test_leveled_never_uses_more_stages(batch in dag_strategy()) {
    let leveled = group(&batch, GroupingStrategy::Leveled);
    let signature = group(&batch, GroupingStrategy::Signature);
    prop_assert!(leveled.len() <= signature.len());
  }
}
