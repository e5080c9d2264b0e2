//! Gate policy: a JSON document at `~/.warden/gates/config.json` defining
//! blocked/warned paths, commands, extensions, intent triggers, and
//! research rules.
//!
//! The store is fail-safe-to-strict: a missing or unparseable file silently
//! yields the built-in defaults, and any section left empty in the file is
//! backfilled from them.

use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};
use std::time::{Duration, Instant};

/// How long a loaded policy stays valid before the file is re-read.
pub const CACHE_TTL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReadPolicy {
    pub enabled: bool,
    pub blocked_paths: Vec<String>,
    pub blocked_extensions: Vec<String>,
    pub warn_extensions: Vec<String>,
    pub warn_patterns: Vec<String>,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_paths: vec![
                "/etc/shadow".into(),
                "/etc/passwd".into(),
                "/.ssh/id_rsa".into(),
                "/.ssh/id_ed25519".into(),
                "/.aws/credentials".into(),
                "/.gnupg/".into(),
            ],
            blocked_extensions: vec![".pem".into(), ".key".into(), ".p12".into(), ".pfx".into()],
            warn_extensions: vec![".env".into(), ".secret".into()],
            warn_patterns: vec!["credentials".into(), "password".into(), "token".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WritePolicy {
    pub enabled: bool,
    pub blocked_paths: Vec<String>,
    pub protected_files: Vec<String>,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_paths: vec![
                "/etc/".into(),
                "/usr/".into(),
                "/bin/".into(),
                "/.ssh/".into(),
                "/.aws/".into(),
            ],
            protected_files: vec![".gitignore".into(), ".env".into(), "Cargo.lock".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellPolicy {
    pub enabled: bool,
    pub blocked_commands: Vec<String>,
    pub warn_commands: Vec<String>,
}

impl Default for ShellPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_commands: vec![
                "rm -rf /".into(),
                "rm -rf /*".into(),
                "> /dev/sda".into(),
                ":(){ :|:& };:".into(),
                "dd if=/dev/zero".into(),
                "chmod -R 777 /".into(),
                "curl | bash".into(),
                "wget | sh".into(),
            ],
            warn_commands: vec!["sudo".into(), "rm -rf".into(), "chmod 777".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChainPolicy {
    pub enabled: bool,
    /// Gate names, in execution order. Gates absent from this list are
    /// skipped; order itself is fixed by the runner.
    pub gates: Vec<String>,
    pub fail_fast: bool,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            gates: vec![
                "intent".into(),
                "delegation".into(),
                "security".into(),
                "research".into(),
            ],
            fail_fast: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntentPolicy {
    pub enabled: bool,
    /// Prompt keyword → skill tags to surface.
    pub skill_triggers: HashMap<String, Vec<String>>,
    pub research_triggers: Vec<String>,
}

impl Default for IntentPolicy {
    fn default() -> Self {
        let mut skill_triggers = HashMap::new();
        skill_triggers.insert("implement".to_string(), vec!["backend".to_string()]);
        skill_triggers.insert(
            "debug".to_string(),
            vec!["debug-like-expert".to_string()],
        );
        skill_triggers.insert("security".to_string(), vec!["security".to_string()]);
        Self {
            enabled: true,
            skill_triggers,
            research_triggers: vec![
                "new framework".into(),
                "best practice".into(),
                "migration".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResearchPolicy {
    pub enabled: bool,
    pub require_before_code: bool,
    pub code_tools: Vec<String>,
    pub research_tools: Vec<String>,
    pub bypass_patterns: Vec<String>,
}

impl Default for ResearchPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            require_before_code: true,
            code_tools: vec!["Write".into(), "Edit".into()],
            research_tools: vec!["WebSearch".into(), "WebFetch".into()],
            bypass_patterns: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// GatesPolicy (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatesPolicy {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub description: String,
    pub updated: String,
    pub read: ReadPolicy,
    pub write: WritePolicy,
    pub shell: ShellPolicy,
    pub chain: ChainPolicy,
    pub intent: IntentPolicy,
    pub research: ResearchPolicy,
}

impl Default for GatesPolicy {
    fn default() -> Self {
        Self {
            schema: "warden-gates/1.0".to_string(),
            description: "Built-in warden gate defaults".to_string(),
            updated: String::new(),
            read: ReadPolicy::default(),
            write: WritePolicy::default(),
            shell: ShellPolicy::default(),
            chain: ChainPolicy::default(),
            intent: IntentPolicy::default(),
            research: ResearchPolicy::default(),
        }
    }
}

impl GatesPolicy {
    /// Load from a JSON file, substituting defaults on any failure and
    /// backfilling empty sections.
    pub fn load_from(path: &Path) -> Self {
        let Ok(data) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        let Ok(mut policy) = serde_json::from_str::<GatesPolicy>(&data) else {
            return Self::default();
        };
        policy.merge_defaults();
        policy
    }

    /// Unset list ⇒ default list. Booleans come from serde defaults, so a
    /// section that is present but partial keeps what it declared.
    fn merge_defaults(&mut self) {
        let defaults = GatesPolicy::default();
        if self.read.blocked_paths.is_empty() {
            self.read.blocked_paths = defaults.read.blocked_paths;
        }
        if self.read.blocked_extensions.is_empty() {
            self.read.blocked_extensions = defaults.read.blocked_extensions;
        }
        if self.write.blocked_paths.is_empty() {
            self.write.blocked_paths = defaults.write.blocked_paths;
        }
        if self.shell.blocked_commands.is_empty() {
            self.shell.blocked_commands = defaults.shell.blocked_commands;
        }
        if self.chain.gates.is_empty() {
            self.chain.gates = defaults.chain.gates;
        }
        if self.research.code_tools.is_empty() {
            self.research.code_tools = defaults.research.code_tools;
        }
        if self.research.research_tools.is_empty() {
            self.research.research_tools = defaults.research.research_tools;
        }
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    pub fn is_blocked_read_path(&self, path: &str) -> bool {
        if !self.read.enabled {
            return false;
        }
        let lower = path.to_lowercase();
        self.read
            .blocked_paths
            .iter()
            .any(|b| lower.contains(&b.to_lowercase()))
    }

    pub fn is_blocked_extension(&self, path: &str) -> bool {
        if !self.read.enabled {
            return false;
        }
        let lower = path.to_lowercase();
        self.read
            .blocked_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
    }

    pub fn is_warn_read_path(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        self.read
            .warn_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
            || self
                .read
                .warn_patterns
                .iter()
                .any(|p| lower.contains(&p.to_lowercase()))
    }

    pub fn is_blocked_shell_command(&self, cmd: &str) -> bool {
        if !self.shell.enabled {
            return false;
        }
        let lower = cmd.to_lowercase();
        self.shell
            .blocked_commands
            .iter()
            .any(|b| lower.contains(&b.to_lowercase()))
    }

    pub fn is_blocked_write_path(&self, path: &str) -> bool {
        if !self.write.enabled {
            return false;
        }
        self.write
            .blocked_paths
            .iter()
            .any(|b| path.starts_with(b.as_str()))
    }

    /// Skill tags whose trigger keyword appears in the prompt.
    pub fn skills_for_prompt(&self, prompt: &str) -> Vec<String> {
        if !self.intent.enabled {
            return Vec::new();
        }
        let lower = prompt.to_lowercase();
        let mut skills: Vec<String> = Vec::new();
        // Deterministic order regardless of map iteration.
        let mut triggers: Vec<_> = self.intent.skill_triggers.iter().collect();
        triggers.sort_by(|a, b| a.0.cmp(b.0));
        for (trigger, tags) in triggers {
            if lower.contains(&trigger.to_lowercase()) {
                for tag in tags {
                    if !skills.contains(tag) {
                        skills.push(tag.clone());
                    }
                }
            }
        }
        skills
    }

    pub fn prompt_requires_research(&self, prompt: &str) -> bool {
        if !self.research.enabled || !self.research.require_before_code {
            return false;
        }
        let lower = prompt.to_lowercase();
        if self
            .research
            .bypass_patterns
            .iter()
            .any(|b| lower.contains(&b.to_lowercase()))
        {
            return false;
        }
        self.intent
            .research_triggers
            .iter()
            .any(|t| lower.contains(&t.to_lowercase()))
    }

    pub fn is_research_tool(&self, tool_name: &str) -> bool {
        self.research.research_tools.iter().any(|t| t == tool_name)
    }

    pub fn is_code_tool(&self, tool_name: &str) -> bool {
        self.research.code_tools.iter().any(|t| t == tool_name)
    }

    pub fn gate_enabled(&self, gate: &str) -> bool {
        self.chain.enabled && self.chain.gates.iter().any(|g| g == gate)
    }
}

// ---------------------------------------------------------------------------
// PolicyCache
// ---------------------------------------------------------------------------

struct CachedPolicy {
    policy: GatesPolicy,
    loaded_at: Instant,
}

/// TTL cache over a policy file. Concurrent readers share the lock; one
/// writer at a time repopulates.
pub struct PolicyCache {
    path: PathBuf,
    inner: RwLock<Option<CachedPolicy>>,
}

impl PolicyCache {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            inner: RwLock::new(None),
        }
    }

    /// Cached load. Within the TTL the file is not re-read.
    pub fn load(&self) -> GatesPolicy {
        if let Ok(guard) = self.inner.read() {
            if let Some(cached) = guard.as_ref() {
                if cached.loaded_at.elapsed() < CACHE_TTL {
                    return cached.policy.clone();
                }
            }
        }
        self.repopulate()
    }

    /// Drop the cache and re-read the file.
    pub fn reload(&self) -> GatesPolicy {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
        self.repopulate()
    }

    fn repopulate(&self) -> GatesPolicy {
        let Ok(mut guard) = self.inner.write() else {
            return GatesPolicy::load_from(&self.path);
        };
        // Re-check under the write lock: another writer may have won.
        if let Some(cached) = guard.as_ref() {
            if cached.loaded_at.elapsed() < CACHE_TTL {
                return cached.policy.clone();
            }
        }
        let policy = GatesPolicy::load_from(&self.path);
        *guard = Some(CachedPolicy {
            policy: policy.clone(),
            loaded_at: Instant::now(),
        });
        policy
    }
}

static CACHE: OnceLock<PolicyCache> = OnceLock::new();

fn global_cache() -> &'static PolicyCache {
    CACHE.get_or_init(|| {
        let path = paths::warden_base()
            .map(|b| paths::gates_config_path(&b))
            .unwrap_or_else(|_| PathBuf::from("config.json"));
        PolicyCache::new(path)
    })
}

/// The process-wide policy, loaded (and TTL-cached) from
/// `~/.warden/gates/config.json`.
pub fn current() -> GatesPolicy {
    global_cache().load()
}

/// Force a reload of the process-wide policy.
pub fn reload() -> GatesPolicy {
    global_cache().reload()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let policy = GatesPolicy::load_from(&dir.path().join("absent.json"));
        assert_eq!(policy, GatesPolicy::default());
    }

    #[test]
    fn unparseable_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(GatesPolicy::load_from(&path), GatesPolicy::default());
    }

    #[test]
    fn partial_section_merges_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"shell": {"warn_commands": ["docker"]}, "read": {"warn_patterns": ["apikey"]}}"#,
        )
        .unwrap();
        let policy = GatesPolicy::load_from(&path);
        // Declared lists kept, empty lists backfilled.
        assert_eq!(policy.shell.warn_commands, vec!["docker"]);
        assert!(!policy.shell.blocked_commands.is_empty());
        assert_eq!(policy.read.warn_patterns, vec!["apikey"]);
        assert!(!policy.read.blocked_paths.is_empty());
        assert!(!policy.chain.gates.is_empty());
    }

    #[test]
    fn read_path_predicates() {
        let policy = GatesPolicy::default();
        assert!(policy.is_blocked_read_path("/etc/shadow"));
        assert!(policy.is_blocked_read_path("/home/u/.SSH/ID_RSA"));
        assert!(!policy.is_blocked_read_path("/home/u/src/main.rs"));
        assert!(policy.is_blocked_extension("server.PEM"));
        assert!(policy.is_warn_read_path("/app/.env"));
        assert!(policy.is_warn_read_path("/srv/db-credentials.txt"));
    }

    #[test]
    fn shell_and_write_predicates() {
        let policy = GatesPolicy::default();
        assert!(policy.is_blocked_shell_command("sudo RM -RF / --no-preserve-root"));
        assert!(!policy.is_blocked_shell_command("cargo build"));
        assert!(policy.is_blocked_write_path("/etc/hosts"));
        assert!(!policy.is_blocked_write_path("/home/u/etc/hosts"));
    }

    #[test]
    fn disabled_section_disables_predicate() {
        let mut policy = GatesPolicy::default();
        policy.shell.enabled = false;
        assert!(!policy.is_blocked_shell_command("rm -rf /"));
    }

    #[test]
    fn skills_for_prompt_accumulates_and_dedupes() {
        let mut policy = GatesPolicy::default();
        policy
            .intent
            .skill_triggers
            .insert("webhook".to_string(), vec!["backend".to_string()]);
        let skills = policy.skills_for_prompt("implement a webhook handler");
        assert_eq!(skills.iter().filter(|s| *s == "backend").count(), 1);
    }

    #[test]
    fn prompt_requires_research_honors_bypass() {
        let mut policy = GatesPolicy::default();
        policy.research.bypass_patterns = vec!["typo".to_string()];
        assert!(policy.prompt_requires_research("adopt the new framework"));
        assert!(!policy.prompt_requires_research("fix typo in new framework docs"));
    }

    #[test]
    fn cache_is_idempotent_within_ttl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"description": "v1"}"#).unwrap();

        let cache = PolicyCache::new(path.clone());
        let first = cache.load();
        assert_eq!(first.description, "v1");

        // Change the file; within the TTL the cached value must win.
        std::fs::write(&path, r#"{"description": "v2"}"#).unwrap();
        let second = cache.load();
        assert_eq!(first, second);

        // Reload bypasses the TTL.
        let third = cache.reload();
        assert_eq!(third.description, "v2");
    }
}
