//! Stdin/stdout plumbing for hook mode.
//!
//! The host pipes a JSON envelope to stdin and reads a JSON decision from
//! stdout. A clean pass prints nothing at all: silence is the cheapest
//! "allow" and keeps the host's context free of noise.

use anyhow::Context;
use std::io::Read;
use warden_core::hook::{HookEnvelope, HookResponse};

/// Read and parse the hook envelope from stdin. A malformed envelope is an
/// internal error: diagnostic to stderr, non-zero exit.
pub fn read_envelope() -> anyhow::Result<HookEnvelope> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read hook envelope from stdin")?;
    Ok(HookEnvelope::from_json(&raw)?)
}

/// Emit a decision envelope on stdout.
pub fn emit(response: &HookResponse) -> anyhow::Result<()> {
    println!("{}", response.to_json()?);
    Ok(())
}

/// Session id for this invocation: the envelope wins, then the exported
/// environment, then a shared default.
pub fn session_id(envelope: Option<&HookEnvelope>) -> String {
    if let Some(env) = envelope {
        if !env.session_id.is_empty() {
            return env.session_id.clone();
        }
    }
    std::env::var("WARDEN_SESSION_ID").unwrap_or_else(|_| "default".to_string())
}
