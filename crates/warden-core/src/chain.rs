//! The verification chain: INTENT → DELEGATION → SECURITY → RESEARCH.
//!
//! Each gate is a pure function from inputs to a verdict; the runner owns
//! sequencing and short-circuit. A block in an earlier gate stops later
//! gates. The runner is the sole authority on whether the hook blocks.

use crate::delegation::{self, DelegationVerdict};
use crate::error::Result;
use crate::intent::{self, Intent, Risk};
use crate::policy::{self, GatesPolicy};
use crate::research::{self, ResearchVerdict};
use crate::security::{self, SecurityVerdict};
use crate::{io, paths};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// GateOutcome / ChainStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Pass,
    Warn,
    Block,
}

impl GateOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            GateOutcome::Pass => "pass",
            GateOutcome::Warn => "warn",
            GateOutcome::Block => "block",
        }
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Pending,
    Approved,
    Blocked,
}

impl ChainStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainStatus::Pending => "pending",
            ChainStatus::Approved => "approved",
            ChainStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GateResult / ChainState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateResult {
    pub gate: String,
    pub outcome: GateOutcome,
    pub reason: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub context: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainState {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation: Option<DelegationVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research: Option<ResearchVerdict>,
    pub results: Vec<GateResult>,
    pub final_status: ChainStatus,
}

impl ChainState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            intent: None,
            delegation: None,
            security: None,
            research: None,
            results: Vec::new(),
            final_status: ChainStatus::Pending,
        }
    }

    fn add_result(&mut self, result: GateResult) {
        if result.outcome == GateOutcome::Block {
            self.final_status = ChainStatus::Blocked;
        }
        self.results.push(result);
    }

    pub fn is_blocked(&self) -> bool {
        self.final_status == ChainStatus::Blocked
    }

    pub fn has_warnings(&self) -> bool {
        self.results.iter().any(|r| r.outcome == GateOutcome::Warn)
    }

    /// `"GATE: reason"` for the first blocking gate, if any.
    pub fn block_reason(&self) -> Option<String> {
        self.results
            .iter()
            .find(|r| r.outcome == GateOutcome::Block)
            .map(|r| format!("{}: {}", r.gate, r.reason))
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct Runner {
    state: ChainState,
    policy: GatesPolicy,
    audit_dir: Option<PathBuf>,
}

impl Runner {
    /// Runner with the process-wide policy, archiving to `~/.warden/chain/`.
    pub fn new(session_id: &str) -> Self {
        let audit_dir = paths::warden_base().ok().map(|b| paths::chain_dir(&b));
        Self::with_policy(session_id, policy::current(), audit_dir)
    }

    pub fn with_policy(
        session_id: &str,
        policy: GatesPolicy,
        audit_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            state: ChainState::new(session_id),
            policy,
            audit_dir,
        }
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Execute the full chain for one pending action.
    pub fn run_full(
        &mut self,
        prompt: &str,
        tool_name: &str,
        tool_input: &Value,
        research_done: bool,
    ) -> &ChainState {
        tracing::debug!(tool = tool_name, "starting verification chain");

        // The Intent record feeds every later gate, so classification
        // always happens even when the INTENT gate itself is disabled.
        let i = intent::analyze(prompt);
        self.state.intent = Some(i);

        if self.policy.gate_enabled("intent") {
            self.run_intent_gate(prompt);
            if self.short_circuit() {
                return self.finalize();
            }
        }

        if self.policy.gate_enabled("delegation") {
            let agent_tag = tool_input
                .get("subagent_type")
                .and_then(Value::as_str)
                .unwrap_or("");
            self.run_delegation_gate(tool_name, agent_tag);
            if self.short_circuit() {
                return self.finalize();
            }
        }

        if self.policy.gate_enabled("security") {
            self.run_security_gate(tool_name, tool_input);
            if self.short_circuit() {
                return self.finalize();
            }
        }

        if self.policy.gate_enabled("research") {
            self.run_research_gate(research_done, prompt);
            if self.short_circuit() {
                return self.finalize();
            }
        }

        if !self.state.is_blocked() {
            self.state.final_status = ChainStatus::Approved;
        }
        self.finalize()
    }

    fn short_circuit(&self) -> bool {
        self.state.is_blocked() && self.policy.chain.fail_fast
    }

    fn intent_ref(&self) -> &Intent {
        // Set unconditionally at the top of run_full.
        self.state.intent.as_ref().expect("intent classified")
    }

    fn run_intent_gate(&mut self, prompt: &str) {
        tracing::debug!("running INTENT gate");
        let i = self.intent_ref().clone();

        let mut context = BTreeMap::new();
        context.insert("type".to_string(), i.kind.to_string());
        context.insert("complexity".to_string(), i.complexity.to_string());
        context.insert("risk_level".to_string(), i.risk.to_string());

        let mut result = GateResult {
            gate: "INTENT".to_string(),
            outcome: GateOutcome::Pass,
            reason: format!(
                "type={} confidence={:.2} risk={}",
                i.kind, i.confidence, i.risk
            ),
            context,
            next_action: None,
            timestamp: Utc::now(),
        };

        // Destructive language with no recognizable intent is the one case
        // the classifier itself refuses.
        if i.risk == Risk::Critical && i.confidence < 0.7 {
            result.outcome = GateOutcome::Block;
            result.reason =
                "critical risk with low confidence - requires explicit verification".to_string();
            result.next_action = Some("clarify user intent before proceeding".to_string());
        }

        // Policy skill triggers enrich the suggestion lists.
        let extra = self.policy.skills_for_prompt(prompt);
        if let Some(i) = self.state.intent.as_mut() {
            for skill in extra {
                if !i.suggested_skills.contains(&skill) {
                    i.suggested_skills.push(skill);
                }
            }
        }

        self.state.add_result(result);
    }

    fn run_delegation_gate(&mut self, tool_name: &str, agent_tag: &str) {
        tracing::debug!("running DELEGATION gate");
        let verdict = delegation::validate(self.intent_ref(), tool_name, agent_tag);

        let mut result = GateResult {
            gate: "DELEGATION".to_string(),
            outcome: GateOutcome::Pass,
            reason: "delegation strategy validated".to_string(),
            context: BTreeMap::new(),
            next_action: None,
            timestamp: Utc::now(),
        };

        if !verdict.approved {
            result.outcome = GateOutcome::Block;
            if let Some(blocker) = verdict.blockers.first() {
                result.reason = blocker.clone();
            }
            result.next_action = Some("provide required parameters or clarify task".to_string());
        } else if let Some(warning) = verdict.warnings.first() {
            result.outcome = GateOutcome::Warn;
            result.reason = warning.clone();
        }

        if let Some(plan) = &verdict.plan {
            result.context.insert("plan".to_string(), plan.clone());
        }

        self.state.delegation = Some(verdict);
        self.state.add_result(result);
    }

    fn run_security_gate(&mut self, tool_name: &str, tool_input: &Value) {
        tracing::debug!("running SECURITY gate");
        let verdict = security::verify(self.intent_ref(), tool_name, tool_input, &self.policy);

        let mut context = BTreeMap::new();
        context.insert("threat_level".to_string(), verdict.threat.to_string());
        context.insert(
            "security_score".to_string(),
            format!("{:.2}", verdict.score),
        );
        if let Some(rec) = verdict.recommendations.first() {
            context.insert("recommendations".to_string(), rec.clone());
        }

        let mut result = GateResult {
            gate: "SECURITY".to_string(),
            outcome: GateOutcome::Pass,
            reason: format!(
                "security_score={:.2} threat={}",
                verdict.score, verdict.threat
            ),
            context,
            next_action: None,
            timestamp: Utc::now(),
        };

        if !verdict.passed {
            result.outcome = GateOutcome::Block;
            if let Some(violation) = verdict.violations.first() {
                result.reason = violation.clone();
            }
            result.next_action = Some("address security violations before proceeding".to_string());
        }

        self.state.security = Some(verdict);
        self.state.add_result(result);
    }

    fn run_research_gate(&mut self, research_done: bool, prompt: &str) {
        tracing::debug!("running RESEARCH gate");
        let verdict = research::check(self.intent_ref(), research_done, prompt, &self.policy);

        let mut result = GateResult {
            gate: "RESEARCH".to_string(),
            outcome: GateOutcome::Pass,
            reason: "research compliance verified".to_string(),
            context: BTreeMap::new(),
            next_action: None,
            timestamp: Utc::now(),
        };

        if verdict.bypass {
            if let Some(reason) = &verdict.bypass_reason {
                result.reason = format!("bypassed: {reason}");
            }
        } else if !verdict.done && self.intent_ref().requires_research {
            result.outcome = GateOutcome::Block;
            result.reason = format!(
                "research required before {}",
                self.intent_ref().kind
            );
            if let Some(query) = &verdict.suggested_query {
                result.next_action = Some(format!("WebSearch: {query}"));
                result
                    .context
                    .insert("suggested_query".to_string(), query.clone());
            }
        }

        self.state.research = Some(verdict);
        self.state.add_result(result);
    }

    /// Archive the state and hand it back. Audit loss is tolerated: the
    /// decision itself is authoritative.
    fn finalize(&mut self) -> &ChainState {
        if let Err(e) = self.archive() {
            tracing::warn!(error = %e, "failed to archive chain state");
        }
        &self.state
    }

    fn archive(&self) -> Result<()> {
        let Some(dir) = &self.audit_dir else {
            return Ok(());
        };
        let filename = format!(
            "chain_{}_{}.json",
            self.state.session_id,
            Utc::now().timestamp()
        );
        let data = serde_json::to_vec_pretty(&self.state)?;
        io::atomic_write(&dir.join(filename), &data)
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Flat section-and-key rendering for host context injection.
    pub fn render_text(&self) -> String {
        let mut out = String::from("[VERIFICATION_CHAIN]\n");
        out.push_str(&format!("session: {}\n", self.state.session_id));
        out.push_str(&format!("status: {}\n", self.state.final_status));
        out.push_str(&format!(
            "timestamp: {}\n\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        ));

        for result in &self.state.results {
            out.push_str(&format!("[{}]\n", result.gate));
            out.push_str(&format!("status: {}\n", result.outcome));
            out.push_str(&format!("reason: {}\n", result.reason));
            if let Some(next) = &result.next_action {
                out.push_str(&format!("next_action: {next}\n"));
            }
            out.push('\n');
        }

        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.state)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
