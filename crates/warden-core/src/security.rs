//! Security screening of pending tool inputs: dangerous shell patterns,
//! sensitive paths, and suspicious edits.
//!
//! Fixed pattern sets guarantee a strict floor; the configurable policy
//! extends them per deployment.

use crate::intent::{Intent, Risk};
use crate::policy::GatesPolicy;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Threat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threat {
    None,
    Low,
    Medium,
    High,
}

impl Threat {
    pub fn as_str(self) -> &'static str {
        match self {
            Threat::None => "none",
            Threat::Low => "low",
            Threat::Medium => "medium",
            Threat::High => "high",
        }
    }
}

impl fmt::Display for Threat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SecurityVerdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityVerdict {
    pub passed: bool,
    /// 1.0 is clean; 0.0 is a hard violation.
    pub score: f64,
    pub threat: Threat,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub violations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub recommendations: Vec<String>,
    /// Gate name plus timestamp, for audit provenance.
    pub provenance: String,
}

impl SecurityVerdict {
    fn clean() -> Self {
        Self {
            passed: true,
            score: 1.0,
            threat: Threat::None,
            violations: Vec::new(),
            recommendations: Vec::new(),
            provenance: String::new(),
        }
    }

    fn fail(&mut self, threat: Threat, score: f64, violation: String) {
        self.passed = false;
        self.threat = self.threat.max(threat);
        self.score = self.score.min(score);
        self.violations.push(violation);
    }
}

// ---------------------------------------------------------------------------
// Fixed pattern sets
// ---------------------------------------------------------------------------

const DANGEROUS_COMMANDS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "> /dev/sda",
    ":(){ :|:& };:",
    "dd if=/dev/zero",
    // Compared against the lowercased command.
    "chmod -r 777 /",
    "curl | bash",
    "wget | sh",
];

const SENSITIVE_PATHS: &[&str] = &[
    "/etc/shadow",
    "/etc/passwd",
    "/.ssh/",
    "/.aws/credentials",
    "/.gnupg/",
    ".pem",
    ".key",
];

const STUB_MARKERS: &[&str] = &["todo", "fixme", "stub", "placeholder"];

fn is_dangerous_command(cmd: &str) -> bool {
    let lower = cmd.to_lowercase();
    if DANGEROUS_COMMANDS.iter().any(|d| lower.contains(d)) {
        return true;
    }
    // `curl http://x | bash` never substring-matches the literal
    // `curl | bash`, so catch downloader-piped-to-shell generally.
    let downloads = lower.contains("curl ") || lower.contains("wget ");
    let pipes_to_shell = lower.contains("| bash") || lower.contains("| sh") || lower.contains("|bash") || lower.contains("|sh ");
    downloads && pipes_to_shell
}

fn is_sensitive_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    SENSITIVE_PATHS.iter().any(|s| lower.contains(s))
}

fn has_stub_marker(s: &str) -> bool {
    let lower = s.to_lowercase();
    STUB_MARKERS.iter().any(|m| lower.contains(m))
}

/// Suspicious edit: significant code replaced with whitespace, or a stub
/// marker removed without the replacement growing.
fn is_problematic_edit(old: &str, new: &str) -> bool {
    if new.trim().is_empty() && old.len() > 100 {
        return true;
    }
    has_stub_marker(old) && !has_stub_marker(new) && new.len() <= old.len()
}

// ---------------------------------------------------------------------------
// Screening
// ---------------------------------------------------------------------------

fn input_str<'a>(tool_input: &'a Value, key: &str) -> &'a str {
    tool_input.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Screen one pending tool invocation. Pure with respect to its inputs.
pub fn verify(
    intent: &Intent,
    tool_name: &str,
    tool_input: &Value,
    policy: &GatesPolicy,
) -> SecurityVerdict {
    let mut verdict = SecurityVerdict::clean();

    match tool_name {
        "Bash" => {
            let cmd = input_str(tool_input, "command");
            if !cmd.is_empty() {
                if is_dangerous_command(cmd) || policy.is_blocked_shell_command(cmd) {
                    verdict.fail(
                        Threat::High,
                        0.0,
                        "dangerous command pattern detected".to_string(),
                    );
                }
            }
        }
        "Read" | "Write" | "Edit" => {
            let path = input_str(tool_input, "file_path");
            if !path.is_empty() {
                let blocked = is_sensitive_path(path)
                    || policy.is_blocked_read_path(path)
                    || policy.is_blocked_extension(path)
                    || (tool_name == "Write" && policy.is_blocked_write_path(path));
                if blocked {
                    verdict.fail(Threat::High, 0.0, format!("sensitive file access: {path}"));
                } else if policy.is_warn_read_path(path) {
                    verdict
                        .recommendations
                        .push(format!("path matches a warn pattern: {path}"));
                }
            }
        }
        _ => {}
    }

    if tool_name == "Edit" {
        let old = input_str(tool_input, "old_string");
        let new = input_str(tool_input, "new_string");
        if is_problematic_edit(old, new) {
            verdict.fail(
                Threat::Medium,
                0.3,
                "suspicious code removal pattern - verify intent".to_string(),
            );
        }
    }

    if intent.risk == Risk::Critical {
        verdict
            .recommendations
            .push("critical-risk intent: require explicit user confirmation".to_string());
    }

    verdict.provenance = format!(
        "security_gate:{}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    verdict
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
