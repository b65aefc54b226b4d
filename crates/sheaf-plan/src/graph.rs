use std::collections::{HashMap, VecDeque};

use sheaf_config::BatchDef;

/// Dependency graph of a batch, for traversal and analysis.
///
/// Edges point from a dependency to its dependents. References to names
/// that are not in the batch are kept aside as dangling instead of being
/// added as edges.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Sub-call names in submission order.
  order: Vec<String>,
  /// Adjacency list: name -> sub-calls that depend on it.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: name -> sub-calls it depends on.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// (sub-call, missing dependency) pairs.
  dangling: Vec<(String, String)>,
}

impl Graph {
  /// Build the graph for a batch.
  pub fn new(batch: &BatchDef) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut dangling = Vec::new();

    for name in batch.names() {
      adjacency.entry(name.to_string()).or_default();
      reverse_adjacency.entry(name.to_string()).or_default();
    }

    for (name, call) in batch.iter() {
      for dep in &call.dependencies {
        if !batch.contains(dep) {
          dangling.push((name.to_string(), dep.clone()));
          continue;
        }
        adjacency
          .entry(dep.clone())
          .or_default()
          .push(name.to_string());
        reverse_adjacency
          .entry(name.to_string())
          .or_default()
          .push(dep.clone());
      }
    }

    let order: Vec<String> = batch.names().map(str::to_string).collect();

    Self {
      order,
      adjacency,
      reverse_adjacency,
      dangling,
    }
  }

  /// Sub-calls that depend on `name`.
  pub fn downstream(&self, name: &str) -> &[String] {
    self
      .adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Sub-calls that `name` depends on (only those present in the batch).
  pub fn upstream(&self, name: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Whether anything depends on `name`.
  pub fn is_depended_upon(&self, name: &str) -> bool {
    !self.downstream(name).is_empty()
  }

  /// Dependencies that name a sub-call not present in the batch.
  pub fn dangling(&self) -> &[(String, String)] {
    &self.dangling
  }

  /// Find a dependency cycle, if any.
  ///
  /// Returns the names along the cycle with the starting name repeated at
  /// the end, e.g. `["a", "b", "a"]`. Traversal follows submission order so
  /// the reported cycle is deterministic.
  pub fn find_cycle(&self) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
      Unvisited,
      InProgress,
      Done,
    }

    let mut marks: HashMap<&str, Mark> = self
      .order
      .iter()
      .map(|name| (name.as_str(), Mark::Unvisited))
      .collect();

    for root in &self.order {
      if marks[root.as_str()] != Mark::Unvisited {
        continue;
      }

      // Stack of (node, index of next upstream edge to follow).
      let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
      marks.insert(root.as_str(), Mark::InProgress);

      while let Some((node, next)) = stack.last().copied() {
        let upstream = self.upstream(node);
        if next >= upstream.len() {
          marks.insert(node, Mark::Done);
          stack.pop();
          continue;
        }

        if let Some(top) = stack.last_mut() {
          top.1 += 1;
        }
        let dep = upstream[next].as_str();

        match marks[dep] {
          Mark::Unvisited => {
            marks.insert(dep, Mark::InProgress);
            stack.push((dep, 0));
          }
          Mark::InProgress => {
            let start = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..]
              .iter()
              .map(|(n, _)| n.to_string())
              .collect();
            cycle.push(dep.to_string());
            return Some(cycle);
          }
          Mark::Done => {}
        }
      }
    }

    None
  }

  /// Longest-path depth of every sub-call: 0 for entry points, otherwise one
  /// more than the deepest dependency.
  ///
  /// Sub-calls caught in a cycle cannot be ordered; they are placed one level
  /// past everything else so the result stays total.
  pub fn depths(&self) -> HashMap<String, usize> {
    let mut remaining: HashMap<&str, usize> = self
      .order
      .iter()
      .map(|name| (name.as_str(), self.upstream(name).len()))
      .collect();
    let mut depths: HashMap<String, usize> = HashMap::with_capacity(self.order.len());
    let mut queue: VecDeque<&str> = self
      .order
      .iter()
      .map(String::as_str)
      .filter(|name| remaining[name] == 0)
      .collect();

    while let Some(name) = queue.pop_front() {
      let depth = self
        .upstream(name)
        .iter()
        .filter_map(|dep| depths.get(dep))
        .map(|d| d + 1)
        .max()
        .unwrap_or(0);
      depths.insert(name.to_string(), depth);

      for dependent in self.downstream(name) {
        if let Some(count) = remaining.get_mut(dependent.as_str()) {
          *count -= 1;
          if *count == 0 {
            queue.push_back(dependent.as_str());
          }
        }
      }
    }

    if depths.len() < self.order.len() {
      let overflow = depths.values().max().map_or(0, |d| d + 1);
      for name in &self.order {
        depths.entry(name.clone()).or_insert(overflow);
      }
    }

    depths
  }
}
