//! Turn a task decomposition into a persisted, levelized DAG.
//!
//! Edges are inferred from agent-tag conventions: research-tagged nodes
//! come first, implementation nodes depend on them, and test-tagged nodes
//! depend on the implementation.

use super::graph::{DagState, Node, NodeStatus};
use super::store::DagStore;
use super::topo::topo_levels;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentRole {
    Research,
    Implement,
    Test,
}

fn role_for(agent: &str) -> AgentRole {
    let lower = agent.to_lowercase();
    if lower.contains("research") || lower.contains("explore") || lower.contains("plan") {
        AgentRole::Research
    } else if lower.contains("test") || lower.contains("qa") {
        AgentRole::Test
    } else {
        AgentRole::Implement
    }
}

/// Build nodes `n1..nk` from parallel subject/agent lists. A short agent
/// list falls back to a generic tag.
pub fn decompose(subjects: &[String], agents: &[String]) -> Vec<Node> {
    subjects
        .iter()
        .enumerate()
        .map(|(i, subject)| {
            let agent = agents.get(i).map(String::as_str).unwrap_or("general-purpose");
            let mut node = Node::new(format!("n{}", i + 1), subject.clone(), agent);
            node.description = subject.clone();
            node
        })
        .collect()
}

/// Build a fresh DAG from `nodes`, infer edges, levelize, mark wave zero
/// ready, and persist. Construction errors leave no state on disk.
pub fn schedule(
    store: &DagStore,
    session_id: &str,
    root_prompt: &str,
    nodes: Vec<Node>,
) -> Result<DagState> {
    let mut state = DagState::new(session_id, root_prompt);
    for node in nodes {
        state.add_node(node)?;
    }
    infer_edges(&mut state)?;
    topo_levels(&mut state)?;

    // The first wave is immediately dispatchable.
    let wave_zero: Vec<String> = state
        .nodes
        .values()
        .filter(|n| n.level == 0)
        .map(|n| n.id.clone())
        .collect();
    for id in wave_zero {
        if let Some(node) = state.nodes.get_mut(&id) {
            node.status = NodeStatus::Ready;
        }
    }

    store.save(&state)?;
    Ok(state)
}

fn infer_edges(state: &mut DagState) -> Result<()> {
    let mut research: Vec<String> = Vec::new();
    let mut implement: Vec<String> = Vec::new();
    let mut test: Vec<String> = Vec::new();
    for node in state.nodes.values() {
        match role_for(&node.agent) {
            AgentRole::Research => research.push(node.id.clone()),
            AgentRole::Implement => implement.push(node.id.clone()),
            AgentRole::Test => test.push(node.id.clone()),
        }
    }

    for dep in &research {
        for node in &implement {
            state.add_edge(dep, node)?;
        }
    }
    // Tests wait on implementation when there is any, otherwise on research.
    let test_deps = if implement.is_empty() {
        &research
    } else {
        &implement
    };
    for dep in test_deps {
        for node in &test {
            state.add_edge(dep, node)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn decompose_assigns_sequential_ids() {
        let nodes = decompose(
            &strings(&["Research patterns", "Implement handler"]),
            &strings(&["research", "backend"]),
        );
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "n1");
        assert_eq!(nodes[1].id, "n2");
        assert_eq!(nodes[1].agent, "backend");
    }

    #[test]
    fn decompose_pads_missing_agents() {
        let nodes = decompose(&strings(&["a", "b"]), &strings(&["research"]));
        assert_eq!(nodes[1].agent, "general-purpose");
    }

    #[test]
    fn schedule_layers_research_then_impl_then_test() {
        let dir = TempDir::new().unwrap();
        let store = DagStore::new(dir.path());
        let nodes = decompose(
            &strings(&[
                "Research webhook patterns",
                "Research provider API",
                "Implement handler",
                "Write tests",
            ]),
            &strings(&["research", "research", "backend", "testing"]),
        );

        let state = schedule(&store, "sched", "build webhook", nodes).unwrap();

        let level_of = |id: &str| state.nodes[id].level;
        assert_eq!(level_of("n1"), 0);
        assert_eq!(level_of("n2"), 0);
        assert_eq!(level_of("n3"), 1);
        assert_eq!(level_of("n4"), 2);
        assert_eq!(state.max_level, 2);

        // Wave zero is ready, later waves pend.
        assert_eq!(state.nodes["n1"].status, NodeStatus::Ready);
        assert_eq!(state.nodes["n3"].status, NodeStatus::Pending);

        // Persisted as part of scheduling.
        assert!(store.load("sched").is_ok());
    }

    #[test]
    fn tests_fall_back_to_research_without_impl() {
        let dir = TempDir::new().unwrap();
        let store = DagStore::new(dir.path());
        let nodes = decompose(
            &strings(&["Research flakiness", "Write regression tests"]),
            &strings(&["research", "qa"]),
        );
        let state = schedule(&store, "s2", "stabilize tests", nodes).unwrap();
        assert_eq!(state.nodes["n2"].depends_on, vec!["n1"]);
    }

    #[test]
    fn all_implement_schedules_one_wave() {
        let dir = TempDir::new().unwrap();
        let store = DagStore::new(dir.path());
        let nodes = decompose(
            &strings(&["Fix module a", "Fix module b"]),
            &strings(&["backend", "backend"]),
        );
        let state = schedule(&store, "s3", "parallel fixes", nodes).unwrap();
        assert_eq!(state.max_level, 0);
        assert!(state.nodes.values().all(|n| n.status == NodeStatus::Ready));
    }

    #[test]
    fn duplicate_decomposition_id_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        let store = DagStore::new(dir.path());
        let mut nodes = decompose(&strings(&["a"]), &strings(&["backend"]));
        nodes.push(Node::new("n1", "dup", "backend"));
        assert!(schedule(&store, "s4", "dup test", nodes).is_err());
        assert!(store.load("s4").is_err());
    }
}
