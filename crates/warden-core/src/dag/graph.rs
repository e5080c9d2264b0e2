//! Graph construction and node status transitions.

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

// ---------------------------------------------------------------------------
// NodeStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Ready,
    Dispatched,
    Running,
    Done,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Done | NodeStatus::Failed | NodeStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Ready => "ready",
            NodeStatus::Dispatched => "dispatched",
            NodeStatus::Running => "running",
            NodeStatus::Done => "done",
            NodeStatus::Failed => "failed",
            NodeStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub blocks: Vec<String>,
    #[serde(default)]
    pub level: usize,
    /// Host-side task id once the wave is dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metadata: BTreeMap<String, String>,
}

impl Node {
    pub fn new(id: impl Into<String>, subject: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            description: String::new(),
            agent: agent.into(),
            skill: None,
            status: NodeStatus::Pending,
            depends_on: Vec::new(),
            blocks: Vec::new(),
            level: 0,
            task_id: None,
            metadata: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// DagStatus / DagState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DagStatus {
    Active,
    Complete,
    Failed,
}

impl DagStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DagStatus::Active => "active",
            DagStatus::Complete => "complete",
            DagStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DagState {
    pub id: String,
    pub session_id: String,
    pub root_prompt: String,
    pub nodes: BTreeMap<String, Node>,
    #[serde(default)]
    pub max_level: usize,
    pub status: DagStatus,
}

impl DagState {
    pub fn new(session_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let digest = Sha256::digest(format!("{prompt}-{nanos}").as_bytes());
        let id = format!("wd-{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2]);
        Self {
            id,
            session_id: session_id.into(),
            root_prompt: prompt,
            nodes: BTreeMap::new(),
            max_level: 0,
            status: DagStatus::Active,
        }
    }

    /// Insert a node. Rejects duplicate ids.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(WardenError::DuplicateNode(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Create a dependency: `dep_id` must complete before `node_id` starts.
    /// Rejects unknown endpoints and edges that would close a cycle.
    pub fn add_edge(&mut self, dep_id: &str, node_id: &str) -> Result<()> {
        if !self.nodes.contains_key(dep_id) {
            return Err(WardenError::NodeNotFound(dep_id.to_string()));
        }
        if !self.nodes.contains_key(node_id) {
            return Err(WardenError::NodeNotFound(node_id.to_string()));
        }
        // Reject if a path from node_id back to dep_id already exists.
        if self.has_path(node_id, dep_id, &mut HashSet::new()) {
            return Err(WardenError::CycleDetected(format!("{dep_id} -> {node_id}")));
        }
        self.nodes
            .get_mut(node_id)
            .expect("checked above")
            .depends_on
            .push(dep_id.to_string());
        self.nodes
            .get_mut(dep_id)
            .expect("checked above")
            .blocks
            .push(node_id.to_string());
        Ok(())
    }

    fn has_path(&self, from: &str, to: &str, visited: &mut HashSet<String>) -> bool {
        if from == to {
            return true;
        }
        if !visited.insert(from.to_string()) {
            return false;
        }
        let Some(node) = self.nodes.get(from) else {
            return false;
        };
        let blocked: Vec<String> = node.blocks.clone();
        blocked.iter().any(|b| self.has_path(b, to, visited))
    }

    /// Transition a node and propagate readiness or skips. Re-marking an
    /// already-terminal node is a no-op.
    pub fn update_status(&mut self, id: &str, status: NodeStatus) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.status.is_terminal() {
            return;
        }
        node.status = status;
        let blocked: Vec<String> = node.blocks.clone();

        match status {
            NodeStatus::Done => {
                for child in &blocked {
                    self.check_ready(child);
                }
            }
            NodeStatus::Failed => {
                for child in &blocked {
                    self.propagate_skip(child);
                }
            }
            _ => {}
        }

        self.recompute_status();
    }

    /// Promote a node to ready iff every dependency is done.
    fn check_ready(&mut self, id: &str) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if node.status.is_terminal() {
            return;
        }
        let all_done = node.depends_on.iter().all(|dep| {
            self.nodes
                .get(dep)
                .is_some_and(|d| d.status == NodeStatus::Done)
        });
        if all_done {
            self.nodes.get_mut(id).expect("checked above").status = NodeStatus::Ready;
        }
    }

    /// Mark every non-terminal transitive descendant skipped.
    fn propagate_skip(&mut self, id: &str) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if node.status.is_terminal() {
            return;
        }
        self.nodes.get_mut(id).expect("checked above").status = NodeStatus::Skipped;
        let blocked: Vec<String> = self.nodes[id].blocks.clone();
        for child in blocked {
            self.propagate_skip(&child);
        }
    }

    fn recompute_status(&mut self) {
        if !self.is_complete() {
            self.status = DagStatus::Active;
            return;
        }
        let any_not_done = self
            .nodes
            .values()
            .any(|n| n.status != NodeStatus::Done);
        self.status = if any_not_done {
            DagStatus::Failed
        } else {
            DagStatus::Complete
        };
    }

    /// Nodes whose status is exactly `ready`.
    pub fn ready_nodes(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| n.status == NodeStatus::Ready)
            .collect()
    }

    /// Every node is terminal. An empty DAG is not complete.
    pub fn is_complete(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.values().all(|n| n.status.is_terminal())
    }

    /// Complete with at least one node not done.
    pub fn has_failed(&self) -> bool {
        self.is_complete() && self.nodes.values().any(|n| n.status != NodeStatus::Done)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn three_chain() -> DagState {
        // a → b → c
        let mut state = DagState::new("s", "chain");
        for id in ["a", "b", "c"] {
            state.add_node(Node::new(id, id.to_uppercase(), "agent")).unwrap();
        }
        state.add_edge("a", "b").unwrap();
        state.add_edge("b", "c").unwrap();
        state
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut state = DagState::new("s", "p");
        state.add_node(Node::new("a", "A", "x")).unwrap();
        assert!(matches!(
            state.add_node(Node::new("a", "A again", "x")),
            Err(WardenError::DuplicateNode(_))
        ));
    }

    #[test]
    fn edge_to_unknown_node_rejected() {
        let mut state = DagState::new("s", "p");
        state.add_node(Node::new("a", "A", "x")).unwrap();
        assert!(matches!(
            state.add_edge("a", "ghost"),
            Err(WardenError::NodeNotFound(_))
        ));
        assert!(matches!(
            state.add_edge("ghost", "a"),
            Err(WardenError::NodeNotFound(_))
        ));
    }

    #[test]
    fn edges_maintain_both_adjacency_lists() {
        let state = three_chain();
        assert_eq!(state.nodes["b"].depends_on, vec!["a"]);
        assert_eq!(state.nodes["a"].blocks, vec!["b"]);
        assert_eq!(state.nodes["c"].depends_on, vec!["b"]);
    }

    #[test]
    fn cycle_rejected_and_state_unchanged() {
        // x → y → z, then z → x closes a cycle.
        let mut state = DagState::new("s", "cycle");
        for id in ["x", "y", "z"] {
            state.add_node(Node::new(id, id, "a")).unwrap();
        }
        state.add_edge("x", "y").unwrap();
        state.add_edge("y", "z").unwrap();
        let err = state.add_edge("z", "x").unwrap_err();
        assert!(matches!(err, WardenError::CycleDetected(_)));
        // Neither adjacency list was touched by the rejected edge.
        assert!(state.nodes["x"].depends_on.is_empty());
        assert_eq!(state.nodes["z"].blocks, Vec::<String>::new());
    }

    #[test]
    fn self_edge_rejected() {
        let mut state = DagState::new("s", "p");
        state.add_node(Node::new("a", "A", "x")).unwrap();
        assert!(state.add_edge("a", "a").is_err());
    }

    #[test]
    fn done_promotes_ready_child() {
        let mut state = three_chain();
        state.update_status("a", NodeStatus::Done);
        assert_eq!(state.nodes["b"].status, NodeStatus::Ready);
        // c has an unfinished dependency and stays pending.
        assert_eq!(state.nodes["c"].status, NodeStatus::Pending);
    }

    #[test]
    fn child_with_open_second_dependency_stays_pending() {
        let mut state = DagState::new("s", "join");
        for id in ["a", "b", "join"] {
            state.add_node(Node::new(id, id, "x")).unwrap();
        }
        state.add_edge("a", "join").unwrap();
        state.add_edge("b", "join").unwrap();

        state.update_status("a", NodeStatus::Done);
        assert_eq!(state.nodes["join"].status, NodeStatus::Pending);
        state.update_status("b", NodeStatus::Done);
        assert_eq!(state.nodes["join"].status, NodeStatus::Ready);
    }

    #[test]
    fn failure_skips_transitive_descendants() {
        let mut state = three_chain();
        state.update_status("a", NodeStatus::Done);
        state.update_status("b", NodeStatus::Failed);
        assert_eq!(state.nodes["c"].status, NodeStatus::Skipped);
        assert!(state.is_complete());
        assert!(state.has_failed());
        assert_eq!(state.status, DagStatus::Failed);
    }

    #[test]
    fn skip_does_not_overwrite_terminal_nodes() {
        let mut state = three_chain();
        state.update_status("c", NodeStatus::Done);
        state.update_status("a", NodeStatus::Failed);
        assert_eq!(state.nodes["b"].status, NodeStatus::Skipped);
        // c already finished; the skip wave must not rewrite it.
        assert_eq!(state.nodes["c"].status, NodeStatus::Done);
    }

    #[test]
    fn all_done_completes_dag() {
        let mut state = three_chain();
        for id in ["a", "b", "c"] {
            state.update_status(id, NodeStatus::Done);
        }
        assert_eq!(state.status, DagStatus::Complete);
        assert!(!state.has_failed());
    }

    #[test]
    fn empty_dag_is_not_complete() {
        let state = DagState::new("s", "empty");
        assert!(!state.is_complete());
        assert!(!state.has_failed());
    }

    #[test]
    fn ready_nodes_filter() {
        let mut state = three_chain();
        assert!(state.ready_nodes().is_empty());
        state.update_status("a", NodeStatus::Done);
        let ready: Vec<_> = state.ready_nodes().iter().map(|n| n.id.clone()).collect();
        assert_eq!(ready, vec!["b"]);
    }

    #[test]
    fn terminal_node_cannot_be_remarked() {
        let mut state = three_chain();
        state.update_status("a", NodeStatus::Done);
        state.update_status("a", NodeStatus::Failed);
        assert_eq!(state.nodes["a"].status, NodeStatus::Done);
        // b stayed ready; no skip wave ran.
        assert_eq!(state.nodes["b"].status, NodeStatus::Ready);
    }

    #[test]
    fn unknown_node_update_is_noop() {
        let mut state = three_chain();
        state.update_status("ghost", NodeStatus::Done);
        assert_eq!(state.status, DagStatus::Active);
    }

    #[test]
    fn dag_ids_are_prefixed_and_distinct() {
        let a = DagState::new("s", "prompt one");
        let b = DagState::new("s", "prompt two");
        assert!(a.id.starts_with("wd-"));
        assert_eq!(a.id.len(), 9);
        assert_ne!(a.id, b.id);
    }
}
