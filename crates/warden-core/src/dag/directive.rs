//! Dispatch directives: the rendered text the host feeds back to the
//! assistant, instructing it to create a whole wave of tasks atomically.

use super::graph::{DagState, Node};

/// Lowest level that still has a non-terminal node, if any.
pub fn current_wave(state: &DagState) -> Option<usize> {
    state
        .nodes
        .values()
        .filter(|n| !n.status.is_terminal())
        .map(|n| n.level)
        .min()
}

/// Render the current wave as a parallel-dispatch directive, or the
/// completion directive once every node is terminal.
pub fn build_dispatch(state: &DagState) -> String {
    let Some(level) = current_wave(state) else {
        return build_complete(&state.id);
    };

    let mut wave: Vec<&Node> = state
        .nodes
        .values()
        .filter(|n| n.level == level && !n.status.is_terminal())
        .collect();
    wave.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out = format!(
        "[DAG_SCHEDULER]\ndag_id: {}\nstatus: {}\nlevel: {}/{}\n\n",
        state.id, state.status, level, state.max_level
    );
    out.push_str(&format!(
        "[PARALLEL_DISPATCH]\ninstruction: Create ALL tasks below in a SINGLE message using parallel task calls\ncount: {}\n\n",
        wave.len()
    ));

    for node in &wave {
        out.push_str(&format!(
            "[TASK:{}]\nsubject: {}\ndescription: {}\nagent: {}\n",
            node.id, node.subject, node.description, node.agent
        ));
        if let Some(skill) = &node.skill {
            out.push_str(&format!("skill: {skill}\n"));
        }
        out.push_str(&format!(
            "metadata: {{\"dag_node_id\": \"{}\"}}\n\n",
            node.id
        ));
    }

    if level < state.max_level {
        out.push_str(
            "[AFTER_LEVEL]\nWhen all tasks above complete, the next level will be dispatched.\n",
        );
    }
    out
}

/// Terminal directive announcing the whole DAG finished.
pub fn build_complete(dag_id: &str) -> String {
    format!("[DAG_COMPLETE]\ndag_id: {dag_id}\nstatus: complete\naction: All scheduled tasks reached a terminal state\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::graph::{DagState, Node, NodeStatus};
    use super::*;

    fn two_wave_state() -> DagState {
        let mut state = DagState::new("s", "two waves");
        let mut first = Node::new("n1", "Research patterns", "research");
        first.status = NodeStatus::Ready;
        let mut second = Node::new("n2", "Implement handler", "backend");
        second.skill = Some("webhooks".to_string());
        second.level = 1;
        state.add_node(first).unwrap();
        state.add_node(second).unwrap();
        state.add_edge("n1", "n2").unwrap();
        state.max_level = 1;
        state
    }

    #[test]
    fn dispatch_renders_current_wave_only() {
        let state = two_wave_state();
        let directive = build_dispatch(&state);
        assert!(directive.starts_with("[DAG_SCHEDULER]\n"));
        assert!(directive.contains(&format!("dag_id: {}", state.id)));
        assert!(directive.contains("level: 0/1"));
        assert!(directive.contains("[PARALLEL_DISPATCH]"));
        assert!(directive.contains("count: 1"));
        assert!(directive.contains("[TASK:n1]"));
        assert!(!directive.contains("[TASK:n2]"));
        assert!(directive.contains("metadata: {\"dag_node_id\": \"n1\"}"));
        assert!(directive.contains("[AFTER_LEVEL]"));
    }

    #[test]
    fn dispatch_advances_after_wave_completes() {
        let mut state = two_wave_state();
        state.update_status("n1", NodeStatus::Done);
        let directive = build_dispatch(&state);
        assert!(directive.contains("level: 1/1"));
        assert!(directive.contains("[TASK:n2]"));
        assert!(directive.contains("skill: webhooks"));
        // Last wave has no after-level note.
        assert!(!directive.contains("[AFTER_LEVEL]"));
    }

    #[test]
    fn finished_dag_renders_completion() {
        let mut state = two_wave_state();
        state.update_status("n1", NodeStatus::Done);
        state.update_status("n2", NodeStatus::Done);
        let directive = build_dispatch(&state);
        assert!(directive.starts_with("[DAG_COMPLETE]\n"));
        assert!(directive.contains(&state.id));
    }

    #[test]
    fn skipped_nodes_do_not_reappear() {
        let mut state = two_wave_state();
        state.update_status("n1", NodeStatus::Failed);
        // n2 was skipped transitively; nothing is dispatchable.
        let directive = build_dispatch(&state);
        assert!(directive.starts_with("[DAG_COMPLETE]\n"));
    }
}
