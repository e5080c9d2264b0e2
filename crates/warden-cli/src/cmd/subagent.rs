//! `warden gates subagent --hook`: track subagent lifecycle, validate
//! agent types against built-ins and the on-disk agent definitions, and
//! hold engineer subagents to the research-first rule.

use crate::hook_stdio;
use warden_core::hook::{event, HookEnvelope, HookResponse};
use warden_core::loader::LazyLoader;
use warden_core::session::{Session, SessionStore};

/// Agent types the host ships with; they have no on-disk definition.
const BUILTIN_AGENTS: &[&str] = &[
    "Bash",
    "Explore",
    "Plan",
    "general-purpose",
    "code-simplifier",
    "statusline-setup",
];

fn is_builtin_agent(agent: &str) -> bool {
    BUILTIN_AGENTS.contains(&agent)
}

fn is_engineer_agent(agent: &str) -> bool {
    agent.to_lowercase().contains("engineer")
}

pub fn run(hook: bool) -> anyhow::Result<()> {
    if !hook {
        super::gates::print_hook_usage("subagent", "SubagentStart, SubagentStop");
        return Ok(());
    }

    let envelope = hook_stdio::read_envelope()?;
    let sid = hook_stdio::session_id(Some(&envelope));
    let store = SessionStore::open_default()?;
    let session = store.get_or_create(&sid)?;

    match envelope.hook_event_name.as_str() {
        event::SUBAGENT_START => handle_start(&envelope, &session),
        event::SUBAGENT_STOP => handle_stop(&envelope, &store, session),
        _ => Ok(()),
    }
}

fn handle_start(envelope: &HookEnvelope, session: &Session) -> anyhow::Result<()> {
    let agent_type = envelope.agent_type.as_str();
    let agent_id = envelope.agent_id.as_str();

    // Lifecycle events have no permission slot: a refusal is reported as
    // additionalContext and the host relays it to the assistant.
    if !agent_type.is_empty() && !is_builtin_agent(agent_type) {
        let loader = LazyLoader::open_default()?;
        if loader.get_agent(agent_type).is_err() {
            return hook_stdio::emit(&HookResponse::context(
                event::SUBAGENT_START,
                &format!("[SUBAGENT_GATE] blocked: unknown agent type: {agent_type}"),
            ));
        }
    }

    if is_engineer_agent(agent_type) && !session.research_done {
        return hook_stdio::emit(&HookResponse::context(
            event::SUBAGENT_START,
            &format!(
                "[SUBAGENT_GATE] blocked: engineer subagent requires research first: agent={agent_type} id={agent_id}"
            ),
        ));
    }

    hook_stdio::emit(&HookResponse::context(
        event::SUBAGENT_START,
        &format!("[SUBAGENT:START] type:{agent_type} id:{agent_id}"),
    ))
}

fn handle_stop(
    envelope: &HookEnvelope,
    store: &SessionStore,
    mut session: Session,
) -> anyhow::Result<()> {
    session.tasks_completed += 1;
    super::persist_session(store, &session);

    hook_stdio::emit(&HookResponse::context(
        event::SUBAGENT_STOP,
        &format!(
            "[SUBAGENT:STOP] type:{} id:{}",
            envelope.agent_type, envelope.agent_id
        ),
    ))
}
