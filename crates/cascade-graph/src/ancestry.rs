//! Ancestor discovery and reload ordering.
//!
//! Answers the question "if this unit is replaced, who else must be
//! refreshed, and in what order?". The ancestors of a unit are everything that
//! reaches it by following dependent edges backwards. They are ordered so that
//! every unit comes after all of its in-batch dependencies; a batch containing
//! a cycle has no such order and is reported as an error with the cycle
//! spelled out.

use crate::edge::GraphEdge;
use crate::error::{GraphError, Result};
use crate::graph::{DependencyGraph, NodeId};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// One unit in a reload plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// The unit to reload.
    pub unit: String,
    /// Shortest number of dependent edges between the root and this unit.
    pub depth: usize,
}

/// The ordered ancestors of a changed unit.
///
/// `steps` excludes the root, which is always reloaded first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadPlan {
    /// The changed unit.
    pub root: String,
    /// Ancestors in reload order.
    pub steps: Vec<PlanStep>,
}

impl ReloadPlan {
    /// Ancestor names in reload order.
    pub fn ancestors(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.unit.as_str()).collect()
    }

    /// The full batch: root first, then ancestors.
    pub fn batch(&self) -> Vec<String> {
        std::iter::once(self.root.clone())
            .chain(self.steps.iter().map(|s| s.unit.clone()))
            .collect()
    }

    /// Number of ancestors.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if nothing depends on the root.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl DependencyGraph {
    /// All units transitively depending on `name`, in discovery order.
    ///
    /// Returns an empty list for unknown units.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let Some(root) = self.get_index(name) else {
            return Vec::new();
        };
        self.discover(root)
            .into_iter()
            .skip(1)
            .map(|(index, _)| self.graph[index].clone())
            .collect()
    }

    /// Computes the order in which `name`'s ancestors must be reloaded.
    ///
    /// Within the batch `{name} ∪ ancestors`, every unit is placed after all
    /// of its dependencies; ties go to the unit discovered first. Self-loops
    /// are ignored. Any longer cycle fails the whole plan.
    pub fn plan_reload(&self, name: &str) -> Result<ReloadPlan> {
        let root = self
            .get_index(name)
            .ok_or_else(|| GraphError::NotInGraph(name.to_string()))?;

        // BFS over dependents; position in this list is the tie-break rank.
        let discovered = self.discover(root);
        let rank: HashMap<NodeId, usize> = discovered
            .iter()
            .enumerate()
            .map(|(i, (index, _))| (*index, i))
            .collect();

        // Unprocessed in-batch dependencies per unit.
        let mut pending: Vec<usize> = discovered
            .iter()
            .map(|(index, _)| {
                self.sorted_neighbors(*index, Direction::Outgoing)
                    .into_iter()
                    .filter(|dep| dep != index && rank.contains_key(dep))
                    .count()
            })
            .collect();

        let mut ready: BTreeSet<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| i)
            .collect();

        let mut processed = vec![false; discovered.len()];
        let mut steps = Vec::with_capacity(discovered.len().saturating_sub(1));

        while let Some(current) = ready.pop_first() {
            processed[current] = true;
            let (index, depth) = discovered[current];

            if index != root {
                steps.push(PlanStep {
                    unit: self.graph[index].clone(),
                    depth,
                });
            }

            for dependent in self.sorted_neighbors(index, Direction::Incoming) {
                if dependent == index {
                    continue;
                }
                if let Some(&r) = rank.get(&dependent) {
                    pending[r] -= 1;
                    if pending[r] == 0 {
                        ready.insert(r);
                    }
                }
            }
        }

        if processed.iter().any(|done| !done) {
            let cycle = self.extract_cycle(&discovered, &rank, &processed);
            return Err(GraphError::Cycle {
                unit: name.to_string(),
                cycle,
            });
        }

        Ok(ReloadPlan {
            root: name.to_string(),
            steps,
        })
    }

    /// BFS over incoming edges. The root comes first with depth 0.
    fn discover(&self, root: NodeId) -> Vec<(NodeId, usize)> {
        let mut order = vec![(root, 0)];
        let mut visited: HashSet<NodeId> = HashSet::from([root]);
        let mut queue: VecDeque<(NodeId, usize)> = VecDeque::from([(root, 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            for dependent in self.sorted_neighbors(current, Direction::Incoming) {
                if visited.insert(dependent) {
                    order.push((dependent, depth + 1));
                    queue.push_back((dependent, depth + 1));
                }
            }
        }

        order
    }

    /// Walks dependency edges among unprocessed units until a unit repeats.
    ///
    /// Every unprocessed unit still waits on an unprocessed dependency, so the
    /// walk always continues and must eventually close a loop.
    fn extract_cycle(
        &self,
        discovered: &[(NodeId, usize)],
        rank: &HashMap<NodeId, usize>,
        processed: &[bool],
    ) -> Vec<GraphEdge> {
        let Some(start) = processed.iter().position(|done| !done) else {
            return Vec::new();
        };

        let mut path: Vec<NodeId> = Vec::new();
        let mut seen_at: HashMap<NodeId, usize> = HashMap::new();
        let mut current = discovered[start].0;

        loop {
            if let Some(&position) = seen_at.get(&current) {
                path.push(current);
                return path[position..]
                    .windows(2)
                    .map(|pair| self.graph_edge(pair[0], pair[1]))
                    .collect();
            }
            seen_at.insert(current, path.len());
            path.push(current);

            let next = self
                .sorted_neighbors(current, Direction::Outgoing)
                .into_iter()
                .filter(|dep| *dep != current)
                .filter_map(|dep| rank.get(&dep).map(|&r| (r, dep)))
                .filter(|(r, _)| !processed[*r])
                .min_by_key(|(r, _)| *r);

            match next {
                Some((_, dep)) => current = dep,
                None => return Vec::new(),
            }
        }
    }

    fn graph_edge(&self, from: NodeId, to: NodeId) -> GraphEdge {
        let kind = self
            .graph
            .find_edge(from, to)
            .and_then(|e| self.graph.edge_weight(e))
            .map(|e| e.kind)
            .unwrap_or(crate::edge::EdgeKind::Imports);

        GraphEdge {
            source: self.graph[from].clone(),
            target: self.graph[to].clone(),
            kind,
        }
    }
}
