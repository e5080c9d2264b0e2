//! `warden orch …`: DAG scheduling, dispatch, and inspection.

use crate::hook_stdio;
use anyhow::{bail, Context};
use clap::Subcommand;
use warden_core::dag::{self, DagState, DagStore, Node, NodeStatus};
use warden_core::hook::HookResponse;
use warden_core::session::SessionStore;

#[derive(Subcommand)]
pub enum OrchSubcommand {
    /// Inspect or manage the session's task DAG
    Dag {
        /// Show current DAG state (default)
        #[arg(long)]
        status: bool,

        /// Clear DAG state for the session
        #[arg(long)]
        reset: bool,

        /// ASCII visualization by level
        #[arg(long)]
        visualize: bool,
    },

    /// Build a DAG from a decomposition envelope and print the first wave
    Schedule {
        /// Read a hook envelope from stdin (tool_input carries `subjects`
        /// and `agents` arrays)
        #[arg(long)]
        hook: bool,
    },

    /// Render the current wave's dispatch directive from persisted state
    Dispatch,
}

pub fn run(subcmd: OrchSubcommand) -> anyhow::Result<()> {
    match subcmd {
        OrchSubcommand::Dag {
            reset, visualize, ..
        } => run_dag(reset, visualize),
        OrchSubcommand::Schedule { hook } => run_schedule(hook),
        OrchSubcommand::Dispatch => run_dispatch(),
    }
}

// ---------------------------------------------------------------------------
// orch dag
// ---------------------------------------------------------------------------

fn run_dag(reset: bool, visualize: bool) -> anyhow::Result<()> {
    let sid = hook_stdio::session_id(None);
    let store = DagStore::open_default()?;

    if reset {
        match store.delete(&sid) {
            Ok(()) => println!("[DAG] reset complete"),
            Err(e) => eprintln!("[DAG] no active DAG to reset: {e}"),
        }
        return Ok(());
    }

    let Ok(state) = store.load(&sid) else {
        println!("[DAG] no active DAG for this session");
        return Ok(());
    };

    if visualize {
        print_levels(&state);
        return Ok(());
    }

    println!(
        "[DAG_STATE]\nid: {}\nsession: {}\nstatus: {}\nlevels: {}\nnodes: {}\n",
        state.id,
        state.session_id,
        state.status,
        state.max_level + 1,
        state.nodes.len()
    );
    for node in state.nodes.values() {
        let deps = if node.depends_on.is_empty() {
            "none".to_string()
        } else {
            node.depends_on.join(",")
        };
        println!(
            "  [{}] {} (L{}) status={} deps={}",
            node.id, node.subject, node.level, node.status, deps
        );
    }
    Ok(())
}

fn print_levels(state: &DagState) {
    for level in 0..=state.max_level {
        println!("=== Level {level} ===");
        for node in state.nodes.values().filter(|n| n.level == level) {
            println!("  [{}] {} {}", status_icon(node), node.id, node.subject);
        }
    }
}

fn status_icon(node: &Node) -> &'static str {
    match node.status {
        NodeStatus::Done => "✓",
        NodeStatus::Failed => "✗",
        NodeStatus::Skipped => "⊘",
        NodeStatus::Running => "►",
        NodeStatus::Dispatched => "→",
        NodeStatus::Ready => "○",
        NodeStatus::Pending => " ",
    }
}

// ---------------------------------------------------------------------------
// orch schedule / dispatch
// ---------------------------------------------------------------------------

fn run_schedule(hook: bool) -> anyhow::Result<()> {
    if !hook {
        println!("warden orch schedule reads a decomposition envelope on stdin.");
        println!("tool_input: {{\"subjects\": [..], \"agents\": [..]}}");
        println!();
        println!("usage: warden orch schedule --hook");
        return Ok(());
    }

    let envelope = hook_stdio::read_envelope()?;
    let sid = hook_stdio::session_id(Some(&envelope));

    let subjects = envelope.input_str_list("subjects");
    let agents = envelope.input_str_list("agents");
    if subjects.is_empty() {
        bail!("decomposition envelope carries no subjects");
    }

    let store = DagStore::open_default()?;
    let nodes = dag::decompose(&subjects, &agents);
    let node_count = nodes.len() as u32;
    let state = dag::schedule(&store, &sid, envelope.effective_prompt(), nodes)
        .context("failed to schedule DAG")?;

    // The host will create one task per wave-zero node.
    if let Ok(session_store) = SessionStore::open_default() {
        if let Ok(mut session) = session_store.get_or_create(&sid) {
            session.tasks_created += node_count;
            super::persist_session(&session_store, &session);
        }
    }

    let directive = dag::build_dispatch(&state);
    let event = if envelope.hook_event_name.is_empty() {
        "UserPromptSubmit"
    } else {
        envelope.hook_event_name.as_str()
    };
    hook_stdio::emit(&HookResponse::context(event, &directive))
}

fn run_dispatch() -> anyhow::Result<()> {
    let sid = hook_stdio::session_id(None);
    let store = DagStore::open_default()?;
    let state = store
        .load(&sid)
        .with_context(|| format!("no active DAG for session '{sid}'"))?;
    print!("{}", dag::build_dispatch(&state));
    Ok(())
}
