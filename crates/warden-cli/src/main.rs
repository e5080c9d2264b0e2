mod cmd;
mod hook_stdio;

use clap::{Parser, Subcommand};
use cmd::{dag::OrchSubcommand, gates::GatesSubcommand, session::SessionSubcommand};

#[derive(Parser)]
#[command(
    name = "warden",
    about = "Policy and orchestration sidecar for AI coding assistants",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hook gates: verification chain, subagent tracking, failure triage
    Gates {
        #[command(subcommand)]
        subcommand: GatesSubcommand,
    },

    /// Orchestration: parallel task DAG scheduling and inspection
    Orch {
        #[command(subcommand)]
        subcommand: OrchSubcommand,
    },

    /// Session lifecycle hooks
    Session {
        #[command(subcommand)]
        subcommand: SessionSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    // `--debug` on any hook command and WARDEN_DEBUG=1 both raise the
    // stderr trace level; the subscriber is installed before dispatch.
    let debug = std::env::var("WARDEN_DEBUG").as_deref() == Ok("1")
        || std::env::args().any(|a| a == "--debug");
    let default_level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Gates { subcommand } => cmd::gates::run(subcommand),
        Commands::Orch { subcommand } => cmd::dag::run(subcommand),
        Commands::Session { subcommand } => cmd::session::run(subcommand),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
