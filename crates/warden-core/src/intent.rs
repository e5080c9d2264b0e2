//! Intent classification: map a free-text prompt to an immutable `Intent`
//! record via case-insensitive keyword buckets.
//!
//! Multiple buckets may match. The last matching bucket wins the kind and
//! confidence; risk and complexity only ever escalate; list fields
//! accumulate and deduplicate.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// IntentKind / Risk / Complexity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Implement,
    Debug,
    Refactor,
    Deploy,
    Security,
    General,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::Implement => "implement",
            IntentKind::Debug => "debug",
            IntentKind::Refactor => "refactor",
            IntentKind::Deploy => "deploy",
            IntentKind::Security => "security",
            IntentKind::General => "general",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered so that a stronger risk overrides a weaker one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Risk {
    Low,
    Medium,
    High,
    Critical,
}

impl Risk {
    pub fn as_str(self) -> &'static str {
        match self {
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
            Risk::Critical => "critical",
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Intent {
    #[serde(rename = "type")]
    pub kind: IntentKind,
    pub confidence: f64,
    pub risk: Risk,
    pub complexity: Complexity,
    pub requires_research: bool,
    pub suggested_agents: Vec<String>,
    pub suggested_skills: Vec<String>,
}

impl Default for Intent {
    fn default() -> Self {
        Self {
            kind: IntentKind::General,
            confidence: 0.5,
            risk: Risk::Low,
            complexity: Complexity::Simple,
            requires_research: false,
            suggested_agents: Vec::new(),
            suggested_skills: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|s| s == item) {
        list.push(item.to_string());
    }
}

/// Classify a prompt. Pure: same prompt, same record.
pub fn analyze(prompt: &str) -> Intent {
    let lower = prompt.to_lowercase();
    let mut intent = Intent::default();

    if contains_any(
        &lower,
        &["implement", "create", "build", "add", "develop", "write"],
    ) {
        intent.kind = IntentKind::Implement;
        intent.confidence = 0.8;
        intent.complexity = intent.complexity.max(Complexity::Moderate);
        intent.requires_research = true;
    }

    if contains_any(
        &lower,
        &["fix", "bug", "error", "debug", "broken", "not working", "crash"],
    ) {
        intent.kind = IntentKind::Debug;
        intent.confidence = 0.85;
        intent.complexity = intent.complexity.max(Complexity::Moderate);
        push_unique(&mut intent.suggested_skills, "debug-like-expert");
    }

    if contains_any(
        &lower,
        &["refactor", "restructure", "clean up", "improve", "optimize"],
    ) {
        intent.kind = IntentKind::Refactor;
        intent.confidence = 0.8;
        intent.risk = intent.risk.max(Risk::Medium);
        intent.complexity = Complexity::Complex;
        intent.requires_research = true;
    }

    if contains_any(
        &lower,
        &["deploy", "release", "publish", "production", "go live"],
    ) {
        intent.kind = IntentKind::Deploy;
        intent.confidence = 0.9;
        intent.risk = intent.risk.max(Risk::High);
        intent.complexity = Complexity::Complex;
        intent.requires_research = true;
        push_unique(&mut intent.suggested_skills, "cloud-infrastructure-mastery");
    }

    if contains_any(
        &lower,
        &["security", "auth", "encrypt", "vulnerability", "password"],
    ) {
        intent.kind = IntentKind::Security;
        intent.confidence = 0.85;
        intent.risk = intent.risk.max(Risk::High);
        intent.requires_research = true;
        push_unique(&mut intent.suggested_skills, "security");
    }

    // Destructive language escalates risk without changing the kind.
    if contains_any(&lower, &["delete", "remove", "drop", "destroy", "purge"]) {
        intent.risk = Risk::Critical;
        intent.complexity = Complexity::Complex;
    }

    intent.suggested_agents = extract_agents(&lower);
    intent
}

/// Fixed keyword → agent-tag map, accumulated in a stable order.
fn extract_agents(lower: &str) -> Vec<String> {
    const AGENT_KEYWORDS: &[(&str, &str)] = &[
        ("backend", "backend-engineer"),
        ("frontend", "frontend-engineer"),
        ("database", "database-engineer"),
        ("devops", "devops-engineer"),
        ("security", "security-engineer"),
        ("test", "qa-lead"),
        ("explore", "Explore"),
        ("plan", "Plan"),
    ];
    let mut agents = Vec::new();
    for (keyword, agent) in AGENT_KEYWORDS {
        if lower.contains(keyword) {
            push_unique(&mut agents, agent);
        }
    }
    agents
}

// ---------------------------------------------------------------------------
// Conversational short-circuits
// ---------------------------------------------------------------------------

/// Exact-match greetings and acknowledgements that never need the chain.
pub fn is_simple_query(prompt: &str) -> bool {
    const SIMPLE: &[&str] = &[
        "hello", "hi", "hey", "thanks", "thank you", "bye", "yes", "no", "ok", "okay",
    ];
    let trimmed = prompt.trim().to_lowercase();
    SIMPLE.iter().any(|s| trimmed == *s)
}

/// Prompt is asking about project status rather than requesting work.
pub fn is_status_query(prompt: &str) -> bool {
    const TRIGGERS: &[&str] = &["project status", "what is the status", "show status", "check status"];
    let lower = prompt.to_lowercase();
    TRIGGERS.iter().any(|t| lower.contains(t))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
