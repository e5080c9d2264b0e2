//! Wire contract with the assistant host.
//!
//! The host invokes the sidecar around tool use and session lifecycle,
//! passing a JSON envelope on stdin and reading a JSON decision on stdout.
//! `PreToolUse` and `PermissionRequest` decisions use the structured
//! `hookSpecificOutput` shape; `PostToolUse` blocks and `Stop` prevention
//! use the legacy `decision` shape; prompt and lifecycle events carry only
//! `additionalContext`.

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub mod event {
    pub const PRE_TOOL_USE: &str = "PreToolUse";
    pub const POST_TOOL_USE: &str = "PostToolUse";
    pub const USER_PROMPT_SUBMIT: &str = "UserPromptSubmit";
    pub const SUBAGENT_START: &str = "SubagentStart";
    pub const SUBAGENT_STOP: &str = "SubagentStop";
    pub const SESSION_START: &str = "SessionStart";
    pub const SESSION_END: &str = "SessionEnd";
    pub const PRE_COMPACT: &str = "PreCompact";
    pub const NOTIFICATION: &str = "Notification";
    pub const PERMISSION_REQUEST: &str = "PermissionRequest";
}

// ---------------------------------------------------------------------------
// HookEnvelope (stdin)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookEnvelope {
    pub session_id: String,
    pub transcript_path: String,
    pub cwd: String,
    pub permission_mode: String,
    pub hook_event_name: String,

    // PreToolUse / PostToolUse / PermissionRequest
    pub tool_name: String,
    pub tool_input: Option<Value>,
    pub tool_use_id: String,

    // PostToolUse
    pub tool_response: Option<Value>,

    // UserPromptSubmit
    pub prompt: String,

    // Stop / SubagentStop
    pub stop_hook_active: bool,

    // SubagentStart / SubagentStop
    pub agent_id: String,
    pub agent_type: String,

    // SessionStart
    pub source: String,
    pub model: String,

    // SessionEnd
    pub reason: String,

    // PreCompact
    pub trigger: String,
}

impl HookEnvelope {
    /// Parse an envelope from raw stdin bytes.
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| WardenError::EnvelopeMalformed(e.to_string()))
    }

    pub fn is_event(&self, name: &str) -> bool {
        self.hook_event_name == name
    }

    /// Extract a string field from the tool input.
    pub fn input_str(&self, key: &str) -> &str {
        self.tool_input
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Extract a string array field from the tool input.
    pub fn input_str_list(&self, key: &str) -> Vec<String> {
        self.tool_input
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Best-effort prompt for classification. Falls back through the tool
    /// input fields that carry user-meaningful text.
    pub fn effective_prompt(&self) -> &str {
        if !self.prompt.is_empty() {
            return &self.prompt;
        }
        for key in ["prompt", "content", "command", "description"] {
            let v = self.input_str(key);
            if !v.is_empty() {
                return v;
            }
        }
        ""
    }
}

// ---------------------------------------------------------------------------
// HookResponse (stdout)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HookResponse {
    // Legacy shape
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,

    // Structured shape
    #[serde(rename = "hookSpecificOutput", skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,

    // Control fields
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_: Option<bool>,
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(rename = "suppressOutput", skip_serializing_if = "std::ops::Not::not")]
    #[serde(default)]
    pub suppress_output: bool,
    #[serde(rename = "systemMessage", skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(rename = "permissionDecision", skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<String>,
    #[serde(
        rename = "permissionDecisionReason",
        skip_serializing_if = "Option::is_none"
    )]
    pub permission_decision_reason: Option<String>,
    #[serde(rename = "updatedInput", skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<Value>,
    #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl HookResponse {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn permission(event: &str, decision: &str, reason: &str) -> Self {
        Self {
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: event.to_string(),
                permission_decision: Some(decision.to_string()),
                permission_decision_reason: Some(reason.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Structured allow for `PreToolUse` / `PermissionRequest`.
    pub fn allow(event: &str, reason: &str) -> Self {
        Self::permission(event, "allow", reason)
    }

    /// Structured deny for `PreToolUse` / `PermissionRequest`.
    pub fn deny(event: &str, reason: &str) -> Self {
        Self::permission(event, "deny", reason)
    }

    /// Structured ask for `PreToolUse` / `PermissionRequest`.
    pub fn ask(event: &str, reason: &str) -> Self {
        Self::permission(event, "ask", reason)
    }

    pub fn with_context(mut self, context: &str) -> Self {
        if let Some(out) = self.hook_specific_output.as_mut() {
            out.additional_context = Some(context.to_string());
        } else {
            self.additional_context = Some(context.to_string());
        }
        self
    }

    pub fn with_updated_input(mut self, input: Value) -> Self {
        if let Some(out) = self.hook_specific_output.as_mut() {
            out.updated_input = Some(input);
        }
        self
    }

    /// Context injection for `UserPromptSubmit` and lifecycle events.
    pub fn context(event: &str, context: &str) -> Self {
        Self {
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: event.to_string(),
                additional_context: Some(context.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Legacy block, used for `PostToolUse` blocks and `Stop` prevention:
    /// the tool has already run (or the turn is ending), so there is no
    /// permission decision left to make.
    pub fn legacy_block(reason: &str) -> Self {
        Self {
            decision: Some("block".to_string()),
            reason: Some(reason.to_string()),
            ..Default::default()
        }
    }

    /// Legacy approve with injected context (PostToolUse advisories).
    pub fn legacy_approve_with_context(reason: &str, context: &str) -> Self {
        Self {
            decision: Some("approve".to_string()),
            reason: Some(reason.to_string()),
            additional_context: Some(context.to_string()),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
