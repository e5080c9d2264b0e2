//! `warden session …`: session lifecycle hooks.

use crate::hook_stdio;
use clap::Subcommand;
use warden_core::hook::{event, HookResponse};
use warden_core::paths;
use warden_core::session::{self, SessionStore};

#[derive(Subcommand)]
pub enum SessionSubcommand {
    /// SessionStart hook: initialize session state and export env vars
    StartHook,

    /// SessionEnd hook: persist final state and print a summary
    EndHook,
}

pub fn run(subcmd: SessionSubcommand) -> anyhow::Result<()> {
    match subcmd {
        SessionSubcommand::StartHook => run_start(),
        SessionSubcommand::EndHook => run_end(),
    }
}

fn run_start() -> anyhow::Result<()> {
    let envelope = hook_stdio::read_envelope()?;
    let sid = hook_stdio::session_id(Some(&envelope));
    let store = SessionStore::open_default()?;
    let session = store.get_or_create(&sid)?;
    super::persist_session(&store, &session);

    // Export session vars for every later shell command.
    if let Ok(env_file) = std::env::var("CLAUDE_ENV_FILE") {
        if !env_file.is_empty() {
            let memory_bank = paths::warden_base()?.join("memory");
            if let Err(e) =
                session::write_env_file(&session, std::path::Path::new(&env_file), &memory_bank)
            {
                tracing::warn!(error = %e, "failed to write env file");
            }
        }
    }

    let source = if envelope.source.is_empty() {
        "startup"
    } else {
        &envelope.source
    };
    hook_stdio::emit(&HookResponse::context(
        event::SESSION_START,
        &format!(
            "[SESSION:START] id:{} project:{} source:{source} research_done:{}",
            session.id, session.project, session.research_done
        ),
    ))
}

fn run_end() -> anyhow::Result<()> {
    let envelope = hook_stdio::read_envelope()?;
    let sid = hook_stdio::session_id(Some(&envelope));
    let store = SessionStore::open_default()?;
    let session = store.get_or_create(&sid)?;
    super::persist_session(&store, &session);

    let reason = if envelope.reason.is_empty() {
        "unknown"
    } else {
        &envelope.reason
    };

    println!("[SESSION_END]");
    println!(
        "date: {}\nsession: {}\nproject: {}\nreason: {reason}\n",
        session.today, session.id, session.project
    );
    println!("[FINAL_STATE]");
    println!(
        "research_done: {}\nmemory_queried: {}",
        session.research_done, session.memory_queried
    );
    println!(
        "tasks_created: {}\ntasks_completed: {}",
        session.tasks_created, session.tasks_completed
    );
    Ok(())
}
