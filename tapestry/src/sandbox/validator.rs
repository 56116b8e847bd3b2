//! Static validation of an intent graph before it may be registered for
//! execution.
//!
//! Checks run in a fixed order: structural presence, edge integrity,
//! cycle freedom (Kahn's algorithm), root trigger binding, per-node type
//! and capability checks in topological order, then — when a UI contract
//! is attached — undirected reachability from the declared data-source
//! nodes, so no action node is orphaned from observable output. The first
//! violated check rejects the whole graph.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, GraphViolation};
use crate::sandbox::graph::{EntryKind, IntentGraph, NodeType, UiContract};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxEvent {
    NodeStart,
    NodeComplete,
}

/// One entry of the simulated execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxLogEntry {
    pub node_id: String,
    pub event: SandboxEvent,
    pub timestamp: DateTime<Utc>,
}

/// Bounded simulated log; oldest entries fall off once capacity is hit.
#[derive(Debug)]
struct SandboxLog {
    entries: VecDeque<SandboxLogEntry>,
    capacity: usize,
}

impl SandboxLog {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    fn push(&mut self, node_id: &str, event: SandboxEvent) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SandboxLogEntry {
            node_id: node_id.to_string(),
            event,
            timestamp: Utc::now(),
        });
    }

    fn into_entries(self) -> Vec<SandboxLogEntry> {
        self.entries.into_iter().collect()
    }
}

/// Successful validation: the graph is sound and this is its simulated run.
#[derive(Debug)]
pub struct GraphValidation {
    pub logs: Vec<SandboxLogEntry>,
}

pub struct IntentGraphValidator {
    log_capacity: usize,
}

impl Default for IntentGraphValidator {
    fn default() -> Self {
        Self { log_capacity: 1024 }
    }
}

impl IntentGraphValidator {
    pub fn new(log_capacity: usize) -> Self {
        Self { log_capacity }
    }

    pub fn validate(
        &self,
        graph: &IntentGraph,
        ui_contract: Option<&UiContract>,
    ) -> Result<GraphValidation, GraphError> {
        if graph.nodes.is_empty() {
            return Err(GraphError::new(
                GraphViolation::SandboxExecutionFailed,
                "graph has no nodes",
            ));
        }

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(graph.nodes.len());
        for (i, node) in graph.nodes.iter().enumerate() {
            if index.insert(node.id.as_str(), i).is_some() {
                return Err(GraphError::new(
                    GraphViolation::SandboxExecutionFailed,
                    format!("duplicate node id '{}'", node.id),
                )
                .at_node(node.id.clone()));
            }
        }

        for edge in &graph.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !index.contains_key(endpoint.as_str()) {
                    return Err(GraphError::new(
                        GraphViolation::DanglingEdge,
                        format!(
                            "edge {} -> {} references unknown node '{endpoint}'",
                            edge.from, edge.to
                        ),
                    )
                    .at_node(endpoint.clone()));
                }
            }
        }

        let order = self.topological_order(graph, &index)?;
        self.check_roots(graph)?;

        let mut log = SandboxLog::new(self.log_capacity);
        for &i in &order {
            let node = &graph.nodes[i];
            match &node.node_type {
                NodeType::Unknown(raw) => {
                    return Err(GraphError::new(
                        GraphViolation::InvalidActionType,
                        format!("node '{}' has unsupported type '{raw}'", node.id),
                    )
                    .at_node(node.id.clone()));
                }
                NodeType::IntegrationCall => {
                    let has_capability = node
                        .capability_id
                        .as_deref()
                        .map(|id| !id.is_empty())
                        .unwrap_or(false);
                    if !has_capability {
                        return Err(GraphError::new(
                            GraphViolation::MissingCapability,
                            format!("integration call '{}' names no capability", node.id),
                        )
                        .at_node(node.id.clone()));
                    }
                }
                NodeType::Transform | NodeType::Condition | NodeType::EmitEvent => {}
            }
            log.push(&node.id, SandboxEvent::NodeStart);
            log.push(&node.id, SandboxEvent::NodeComplete);
        }

        if let Some(contract) = ui_contract {
            self.check_ui_reachability(graph, &index, contract)?;
        }

        Ok(GraphValidation {
            logs: log.into_entries(),
        })
    }

    /// Kahn's algorithm; a sort that covers fewer nodes than the graph has
    /// means at least one cycle.
    fn topological_order(
        &self,
        graph: &IntentGraph,
        index: &HashMap<&str, usize>,
    ) -> Result<Vec<usize>, GraphError> {
        let n = graph.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in &graph.edges {
            let from = index[edge.from.as_str()];
            let to = index[edge.to.as_str()];
            successors[from].push(to);
            in_degree[to] += 1;
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &next in &successors[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() < n {
            let mut stuck: Vec<&str> = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| graph.nodes[i].id.as_str())
                .collect();
            stuck.sort_unstable();
            return Err(GraphError::new(
                GraphViolation::CycleDetected,
                format!("cycle involving nodes: {}", stuck.join(", ")),
            ));
        }
        Ok(order)
    }

    /// Every root (zero in-degree) must be bound to a recognized trigger.
    fn check_roots(&self, graph: &IntentGraph) -> Result<(), GraphError> {
        let targets: HashSet<&str> = graph.edges.iter().map(|e| e.to.as_str()).collect();
        for node in &graph.nodes {
            if targets.contains(node.id.as_str()) {
                continue;
            }
            let recognized = matches!(
                node.entry_kind,
                Some(EntryKind::Lifecycle) | Some(EntryKind::Ui) | Some(EntryKind::Synthetic)
            );
            if !recognized {
                return Err(GraphError::new(
                    GraphViolation::UnreachableNode,
                    format!("root node '{}' is not bound to a recognized trigger", node.id),
                )
                .at_node(node.id.clone())
                .with_auto_fix(
                    "declare an entry_kind of lifecycle, ui, or synthetic on the root node",
                ));
            }
        }
        Ok(())
    }

    /// Undirected breadth-first sweep from the UI-declared data-source
    /// nodes; anything never visited is orphaned from observable output.
    fn check_ui_reachability(
        &self,
        graph: &IntentGraph,
        index: &HashMap<&str, usize>,
        contract: &UiContract,
    ) -> Result<(), GraphError> {
        let n = graph.nodes.len();
        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in &graph.edges {
            let from = index[edge.from.as_str()];
            let to = index[edge.to.as_str()];
            neighbors[from].push(to);
            neighbors[to].push(from);
        }

        let mut visited = vec![false; n];
        let mut queue = VecDeque::new();
        for view in &contract.views {
            match index.get(view.data_source_node_id.as_str()) {
                Some(&i) => {
                    if !visited[i] {
                        visited[i] = true;
                        queue.push_back(i);
                    }
                }
                None => {
                    return Err(GraphError::new(
                        GraphViolation::UnreachableNode,
                        format!(
                            "ui view '{}' references unknown node '{}'",
                            view.view_id, view.data_source_node_id
                        ),
                    )
                    .at_node(view.data_source_node_id.clone()));
                }
            }
        }

        while let Some(i) = queue.pop_front() {
            for &next in &neighbors[i] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        if let Some(i) = (0..n).find(|&i| !visited[i]) {
            let id = graph.nodes[i].id.clone();
            return Err(GraphError::new(
                GraphViolation::UnreachableNode,
                format!("node '{id}' is not connected to any declared UI view"),
            )
            .at_node(id.clone())
            .with_auto_fix(format!("connect '{id}' to a UI view or remove it")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::graph::{ExecutionNode, GraphEdge};

    fn call(id: &str) -> ExecutionNode {
        ExecutionNode::new(id, NodeType::IntegrationCall).with_capability("github_issues_list")
    }

    #[test]
    fn empty_graph_is_rejected() {
        let validator = IntentGraphValidator::default();
        let err = validator.validate(&IntentGraph::default(), None).unwrap_err();
        assert_eq!(err.reason, GraphViolation::SandboxExecutionFailed);
    }

    #[test]
    fn accepted_graph_simulates_every_node() {
        let validator = IntentGraphValidator::default();
        let graph = IntentGraph {
            nodes: vec![
                call("fetch").with_entry_kind(EntryKind::Lifecycle),
                ExecutionNode::new("shape", NodeType::Transform),
            ],
            edges: vec![GraphEdge::new("fetch", "shape")],
        };
        let validation = validator.validate(&graph, None).unwrap();
        // start + complete per node
        assert_eq!(validation.logs.len(), 4);
        assert_eq!(validation.logs[0].node_id, "fetch");
        assert_eq!(validation.logs[0].event, SandboxEvent::NodeStart);
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let validator = IntentGraphValidator::default();
        let graph = IntentGraph {
            nodes: vec![
                call("a").with_entry_kind(EntryKind::Synthetic),
                call("a").with_entry_kind(EntryKind::Synthetic),
            ],
            edges: vec![],
        };
        let err = validator.validate(&graph, None).unwrap_err();
        assert_eq!(err.reason, GraphViolation::SandboxExecutionFailed);
    }

    #[test]
    fn unsupported_node_type_is_rejected() {
        let validator = IntentGraphValidator::default();
        let graph = IntentGraph {
            nodes: vec![ExecutionNode::new("n1", NodeType::Unknown("teleport".to_string()))
                .with_entry_kind(EntryKind::Synthetic)],
            edges: vec![],
        };
        let err = validator.validate(&graph, None).unwrap_err();
        assert_eq!(err.reason, GraphViolation::InvalidActionType);
        assert_eq!(err.node_id.as_deref(), Some("n1"));
    }

    #[test]
    fn integration_call_without_capability_is_rejected() {
        let validator = IntentGraphValidator::default();
        let graph = IntentGraph {
            nodes: vec![ExecutionNode::new("n1", NodeType::IntegrationCall)
                .with_entry_kind(EntryKind::Ui)],
            edges: vec![],
        };
        let err = validator.validate(&graph, None).unwrap_err();
        assert_eq!(err.reason, GraphViolation::MissingCapability);
    }
}
