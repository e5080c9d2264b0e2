//! `warden gates chain --hook`: run the verification chain for a pending
//! action and translate the result into the host's decision envelope.

use crate::hook_stdio;
use serde_json::Value;
use warden_core::chain::Runner;
use warden_core::hook::{event, HookEnvelope, HookResponse};
use warden_core::intent;
use warden_core::policy;
use warden_core::session::SessionStore;

pub fn run(hook: bool) -> anyhow::Result<()> {
    if !hook {
        super::gates::print_hook_usage(
            "chain",
            "UserPromptSubmit, PreToolUse, PostToolUse, PermissionRequest",
        );
        return Ok(());
    }

    let envelope = hook_stdio::read_envelope()?;
    let sid = hook_stdio::session_id(Some(&envelope));
    let store = SessionStore::open_default()?;
    let session = store.get_or_create(&sid)?;

    match envelope.hook_event_name.as_str() {
        event::USER_PROMPT_SUBMIT => run_prompt_submit(&envelope, &sid, session.research_done),
        event::PRE_TOOL_USE | event::PERMISSION_REQUEST => {
            run_pre_tool(&envelope, &sid, session.research_done)
        }
        event::POST_TOOL_USE => run_post_tool(&envelope, &sid, &store, session),
        // Lifecycle events carry nothing for the chain to decide.
        _ => Ok(()),
    }
}

/// UserPromptSubmit injects context; it never blocks the prompt itself.
fn run_prompt_submit(
    envelope: &HookEnvelope,
    sid: &str,
    research_done: bool,
) -> anyhow::Result<()> {
    let prompt = envelope.effective_prompt();
    if intent::is_simple_query(prompt) || intent::is_status_query(prompt) {
        return Ok(());
    }

    let mut runner = Runner::new(sid);
    runner.run_full(prompt, "", &Value::Null, research_done);
    let context = runner.render_text();
    hook_stdio::emit(&HookResponse::context(event::USER_PROMPT_SUBMIT, &context))
}

fn run_pre_tool(envelope: &HookEnvelope, sid: &str, research_done: bool) -> anyhow::Result<()> {
    let tool_input = envelope.tool_input.clone().unwrap_or(Value::Null);
    let mut runner = Runner::new(sid);
    runner.run_full(
        envelope.effective_prompt(),
        &envelope.tool_name,
        &tool_input,
        research_done,
    );
    let state = runner.state();

    if state.is_blocked() {
        let reason = state.block_reason().unwrap_or_default();
        // Research enforcement is scoped to code-mutating tools; other
        // tools get the finding as context instead of a hard deny.
        let research_only = state
            .results
            .iter()
            .all(|r| r.gate == "RESEARCH" || r.outcome != warden_core::chain::GateOutcome::Block);
        if research_only && !policy::current().is_code_tool(&envelope.tool_name) {
            let response = HookResponse::allow(&envelope.hook_event_name, &reason)
                .with_context(&runner.render_text());
            return hook_stdio::emit(&response);
        }

        let response = HookResponse::deny(&envelope.hook_event_name, &reason)
            .with_context(&runner.render_text());
        return hook_stdio::emit(&response);
    }

    if state.has_warnings() {
        let response = HookResponse::allow(&envelope.hook_event_name, "chain passed with warnings")
            .with_context(&runner.render_text());
        return hook_stdio::emit(&response);
    }

    // Silent pass: no output keeps the host context clean.
    Ok(())
}

/// PostToolUse observes what already ran: record research/memory signals,
/// bump counters, and report post-hoc findings as a legacy block.
fn run_post_tool(
    envelope: &HookEnvelope,
    sid: &str,
    store: &SessionStore,
    mut session: warden_core::session::Session,
) -> anyhow::Result<()> {
    let gates_policy = policy::current();
    let mut dirty = false;

    if gates_policy.is_research_tool(&envelope.tool_name) && !session.research_done {
        session.research_done = true;
        dirty = true;
    }
    if envelope.tool_name.to_lowercase().contains("memory") && !session.memory_queried {
        session.memory_queried = true;
        dirty = true;
    }
    if envelope.tool_name == warden_core::delegation::TASK_TOOL {
        session.tasks_created += 1;
        dirty = true;
    }
    if dirty {
        super::persist_session(store, &session);
    }

    let tool_input = envelope.tool_input.clone().unwrap_or(Value::Null);
    let mut runner = Runner::new(sid);
    runner.run_full(
        envelope.effective_prompt(),
        &envelope.tool_name,
        &tool_input,
        session.research_done,
    );
    let state = runner.state();

    if state.is_blocked() {
        let reason = state.block_reason().unwrap_or_default();
        return hook_stdio::emit(&HookResponse::legacy_block(&reason));
    }
    Ok(())
}
