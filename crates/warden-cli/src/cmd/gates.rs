use clap::Subcommand;

use super::{chain, failure, subagent};

#[derive(Subcommand)]
pub enum GatesSubcommand {
    /// Verification chain: intent → delegation → security → research
    Chain {
        /// Read a hook envelope from stdin and emit a decision
        #[arg(long)]
        hook: bool,

        /// Trace gate execution to stderr
        #[arg(long)]
        debug: bool,
    },

    /// SubagentStart/SubagentStop gate: validate agent types, enforce
    /// research before engineer subagents
    Subagent {
        #[arg(long)]
        hook: bool,
    },

    /// Tool-failure triage: suggest fixes for common failure patterns
    Failure {
        #[arg(long)]
        hook: bool,
    },
}

pub fn run(subcmd: GatesSubcommand) -> anyhow::Result<()> {
    match subcmd {
        GatesSubcommand::Chain { hook, .. } => chain::run(hook),
        GatesSubcommand::Subagent { hook } => subagent::run(hook),
        GatesSubcommand::Failure { hook } => failure::run(hook),
    }
}

/// Hook commands invoked interactively just explain themselves.
pub(crate) fn print_hook_usage(command: &str, events: &str) {
    println!("warden gates {command} reads a hook envelope on stdin.");
    println!("hooks: {events}");
    println!();
    println!("usage: warden gates {command} --hook");
}
