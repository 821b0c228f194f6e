//! Plan module: compile the model graph into a deterministic execution order.

use crate::error::ConfigError;
use crate::graph::ModelGraph;
use crate::invariant_ppt::{
    assert_invariant, PLAN_COVERS_ALL_MODELS, PLAN_REJECTS_CYCLES, PLAN_SOUNDNESS,
};
use crate::model::ModelId;
use crate::signal::SignalId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A producer → consumer dependency carried by one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanEdge {
    /// Producing model
    pub from: ModelId,
    /// Consuming model
    pub to: ModelId,
    /// Signal carrying the dependency
    pub signal: SignalId,
}

/// The compiled plan: edges and execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub order: Vec<ModelId>,
    pub edges: Vec<PlanEdge>,
}

impl ExecutionPlan {
    /// Build the dependency graph and order it.
    ///
    /// Among models with no ordering constraint the one constructed first runs first.
    pub fn compile(graph: &ModelGraph) -> Result<Self, ConfigError> {
        let edges = collect_edges(graph);
        let order = topo_sort(graph.model_count(), &edges).map_err(|stuck| {
            assert_invariant(
                PLAN_REJECTS_CYCLES,
                !stuck.is_empty(),
                "cycle leaves models unscheduled",
                Some("compile"),
            );
            ConfigError::CycleDetected {
                models: stuck
                    .iter()
                    .map(|&id| graph.model_name(id).unwrap_or("?").to_string())
                    .collect(),
            }
        })?;

        let plan = Self { order, edges };
        assert_invariant(
            PLAN_SOUNDNESS,
            plan.is_sound(),
            "every producer precedes its consumers",
            Some("compile"),
        );
        assert_invariant(
            PLAN_COVERS_ALL_MODELS,
            plan.order.len() == graph.model_count(),
            "every model scheduled exactly once",
            Some("compile"),
        );
        Ok(plan)
    }

    /// Position of a model in the order.
    pub fn position(&self, id: ModelId) -> Option<usize> {
        self.order.iter().position(|&m| m == id)
    }

    /// True if every edge goes forward in the order.
    pub fn is_sound(&self) -> bool {
        let mut rank = vec![usize::MAX; self.order.len()];
        for (i, id) in self.order.iter().enumerate() {
            if let Some(r) = rank.get_mut(id.0) {
                *r = i;
            }
        }
        self.edges.iter().all(|e| {
            matches!(
                (rank.get(e.from.0), rank.get(e.to.0)),
                (Some(&a), Some(&b)) if a < b
            )
        })
    }

    /// Models that consume something `id` produces, in order of first edge.
    pub fn consumers_of(&self, id: ModelId) -> Vec<ModelId> {
        let mut out: Vec<ModelId> = Vec::new();
        for e in self.edges.iter().filter(|e| e.from == id) {
            if !out.contains(&e.to) {
                out.push(e.to);
            }
        }
        out
    }
}

fn collect_edges(graph: &ModelGraph) -> Vec<PlanEdge> {
    let mut edges = Vec::new();
    for slot in graph.signals() {
        let Some(from) = slot.producer() else {
            continue;
        };
        for &to in slot.consumers() {
            edges.push(PlanEdge {
                from,
                to,
                signal: slot.id(),
            });
        }
    }
    edges
}

/// Kahn's algorithm with a min-heap ready set. Returns the unscheduled models on a cycle.
fn topo_sort(model_count: usize, edges: &[PlanEdge]) -> Result<Vec<ModelId>, Vec<ModelId>> {
    let mut in_degree = vec![0usize; model_count];
    let mut adj: Vec<Vec<usize>> = vec![vec![]; model_count];

    for edge in edges {
        let (from, to) = (edge.from.0, edge.to.0);
        if from >= model_count || to >= model_count {
            continue;
        }
        // several signals between the same pair count once
        if !adj[from].contains(&to) {
            adj[from].push(to);
            in_degree[to] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(model_count);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(ModelId(node));
        for &next in &adj[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() == model_count {
        Ok(order)
    } else {
        Err(in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg > 0)
            .map(|(i, _)| ModelId(i))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: usize, to: usize) -> PlanEdge {
        PlanEdge {
            from: ModelId(from),
            to: ModelId(to),
            signal: SignalId(0),
        }
    }

    #[test]
    fn plan_stability() {
        let edges = vec![edge(0, 2), edge(1, 2)];
        let a = topo_sort(3, &edges).unwrap();
        let b = topo_sort(3, &edges).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, vec![ModelId(0), ModelId(1), ModelId(2)]);
    }

    #[test]
    fn declaration_order_breaks_ties() {
        // 3 feeds 0; 1 and 2 are independent
        let edges = vec![edge(3, 0)];
        let order = topo_sort(4, &edges).unwrap();
        assert_eq!(order, vec![ModelId(1), ModelId(2), ModelId(3), ModelId(0)]);
    }

    #[test]
    fn parallel_signals_count_once() {
        let edges = vec![edge(0, 1), edge(0, 1), edge(0, 1)];
        assert_eq!(topo_sort(2, &edges).unwrap(), vec![ModelId(0), ModelId(1)]);
    }

    #[test]
    fn cycle_reports_stuck_models() {
        let edges = vec![edge(0, 1), edge(1, 2), edge(2, 1)];
        let stuck = topo_sort(3, &edges).unwrap_err();
        assert_eq!(stuck, vec![ModelId(1), ModelId(2)]);
    }

    #[test]
    fn soundness_detects_backward_edge() {
        let plan = ExecutionPlan {
            order: vec![ModelId(1), ModelId(0)],
            edges: vec![edge(0, 1)],
        };
        assert!(!plan.is_sound());
        assert_eq!(plan.position(ModelId(0)), Some(1));
    }

    #[test]
    fn plan_debug_smoke_test() {
        let plan = ExecutionPlan {
            order: vec![ModelId(0)],
            edges: vec![],
        };
        let debug_str = format!("{:?}", plan);
        assert!(debug_str.contains("order"));
        assert!(debug_str.contains("edges"));
    }
}
