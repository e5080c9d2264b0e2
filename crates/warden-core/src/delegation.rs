//! Delegation validation: is the pending tool invocation a well-formed
//! hand-off for this intent?

use crate::intent::{Complexity, Intent, Risk};
use serde::{Deserialize, Serialize};

/// The host's sub-agent dispatch tool.
pub const TASK_TOOL: &str = "Task";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DelegationVerdict {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub assigned_agents: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub breakdown: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub blockers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

/// Pure with respect to its inputs; the runner owns sequencing.
pub fn validate(intent: &Intent, tool_name: &str, agent_tag: &str) -> DelegationVerdict {
    let mut verdict = DelegationVerdict {
        approved: true,
        ..Default::default()
    };

    // Sub-agent dispatch without an agent type cannot be routed.
    if tool_name == TASK_TOOL && agent_tag.is_empty() {
        verdict.approved = false;
        verdict
            .blockers
            .push("task dispatch requires an agent type".to_string());
        return verdict;
    }

    if !agent_tag.is_empty() && !intent.suggested_agents.is_empty() {
        if !intent.suggested_agents.iter().any(|a| a == agent_tag) {
            verdict.warnings.push(format!(
                "agent '{agent_tag}' may not be optimal for intent '{}'",
                intent.kind
            ));
        } else {
            verdict.assigned_agents.push(agent_tag.to_string());
        }
    }

    if intent.risk == Risk::Critical {
        verdict
            .warnings
            .push("critical risk level - verify user intent before proceeding".to_string());
    }

    if intent.complexity == Complexity::Complex {
        verdict.plan = Some("complex task - recommend task breakdown".to_string());
        verdict.breakdown = vec![
            "1. Research current patterns".to_string(),
            "2. Create implementation plan".to_string(),
            "3. Implement with verification".to_string(),
            "4. Test and validate".to_string(),
        ];
    }

    verdict
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent;

    #[test]
    fn task_without_agent_is_blocked() {
        let i = intent::analyze("implement the parser");
        let verdict = validate(&i, TASK_TOOL, "");
        assert!(!verdict.approved);
        assert_eq!(verdict.blockers.len(), 1);
    }

    #[test]
    fn task_with_agent_is_approved() {
        let i = intent::analyze("implement the backend parser");
        let verdict = validate(&i, TASK_TOOL, "backend-engineer");
        assert!(verdict.approved);
        assert!(verdict.blockers.is_empty());
        assert_eq!(verdict.assigned_agents, vec!["backend-engineer"]);
    }

    #[test]
    fn non_suggested_agent_warns() {
        let i = intent::analyze("implement the backend parser");
        let verdict = validate(&i, TASK_TOOL, "frontend-engineer");
        assert!(verdict.approved);
        assert!(verdict.warnings.iter().any(|w| w.contains("not be optimal")));
    }

    #[test]
    fn critical_risk_warns() {
        let i = intent::analyze("purge the cache directory");
        let verdict = validate(&i, "Bash", "");
        assert!(verdict.approved);
        assert!(verdict.warnings.iter().any(|w| w.contains("critical risk")));
    }

    #[test]
    fn complex_intent_gets_breakdown() {
        let i = intent::analyze("refactor the storage layer");
        let verdict = validate(&i, "Edit", "");
        assert_eq!(verdict.breakdown.len(), 4);
        assert!(verdict.plan.is_some());
    }

    #[test]
    fn simple_intent_no_breakdown() {
        let i = intent::analyze("what is this?");
        let verdict = validate(&i, "Read", "");
        assert!(verdict.breakdown.is_empty());
        assert!(verdict.plan.is_none());
    }
}
