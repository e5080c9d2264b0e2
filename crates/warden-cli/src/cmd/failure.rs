//! `warden gates failure --hook`: react to tool failures with a fix
//! suggestion when the error matches a known pattern.

use crate::hook_stdio;
use serde_json::Value;
use warden_core::hook::{HookEnvelope, HookResponse};

pub fn run(hook: bool) -> anyhow::Result<()> {
    if !hook {
        super::gates::print_hook_usage("failure", "PostToolUseFailure");
        return Ok(());
    }

    let envelope = hook_stdio::read_envelope()?;
    let err_msg = extract_error(&envelope);

    let Some(suggestion) = detect_pattern(&envelope.tool_name, &err_msg) else {
        return Ok(());
    };

    let context = format!(
        "[FAILURE_GATE]\ntool: {}\nerror: {}\nsuggestion: {}\n",
        envelope.tool_name,
        truncate(&err_msg, 200),
        suggestion
    );
    hook_stdio::emit(&HookResponse::legacy_approve_with_context(
        "tool failure triaged",
        &context,
    ))
}

fn extract_error(envelope: &HookEnvelope) -> String {
    let Some(resp) = &envelope.tool_response else {
        return String::new();
    };
    for key in ["error", "stderr"] {
        if let Some(msg) = resp.get(key).and_then(Value::as_str) {
            if !msg.is_empty() {
                return msg.to_string();
            }
        }
    }
    String::new()
}

fn detect_pattern(tool: &str, err: &str) -> Option<&'static str> {
    if err.is_empty() {
        return None;
    }
    let lower = err.to_lowercase();

    match tool {
        "Bash" => {
            if lower.contains("command not found") {
                return Some("binary not installed or not in PATH");
            }
            if lower.contains("permission denied") {
                return Some("check file permissions or use an appropriate user");
            }
        }
        "Write" | "Edit" => {
            if lower.contains("no such file") {
                return Some("parent directory may not exist - create it first");
            }
            if lower.contains("not unique") {
                return Some("edit old_string not unique - add more surrounding context");
            }
        }
        "Read" => {
            if lower.contains("no such file") {
                return Some("file does not exist - verify the path with a glob first");
            }
        }
        _ => {}
    }
    None
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
