//! Lazy loading of agent and skill definitions from on-disk markdown.
//!
//! A keyed cache: each name's computation runs at most once per process,
//! guarded per key, so a hot gate path never re-reads markdown.

use crate::error::{Result, WardenError};
use crate::paths;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AgentDef {
    pub name: String,
    pub description: String,
    pub model: Option<String>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillDef {
    pub name: String,
    pub description: String,
    pub triggers: Vec<String>,
    pub content: String,
}

// ---------------------------------------------------------------------------
// LazyMap
// ---------------------------------------------------------------------------

type Entry<T> = Arc<OnceLock<std::result::Result<Arc<T>, String>>>;

/// Per-key once-only computation. The outer mutex only guards the entry
/// map; the load itself runs under the key's own `OnceLock`.
struct LazyMap<T> {
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T> LazyMap<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_load(
        &self,
        name: &str,
        load: impl FnOnce() -> std::result::Result<T, String>,
    ) -> std::result::Result<Arc<T>, String> {
        let entry = {
            let mut map = self.entries.lock().expect("loader map poisoned");
            map.entry(name.to_string()).or_default().clone()
        };
        entry
            .get_or_init(|| load().map(Arc::new))
            .clone()
    }

    fn is_loaded(&self, name: &str) -> bool {
        let map = self.entries.lock().expect("loader map poisoned");
        map.get(name)
            .is_some_and(|e| matches!(e.get(), Some(Ok(_))))
    }

    fn loaded_keys(&self) -> Vec<String> {
        let map = self.entries.lock().expect("loader map poisoned");
        let mut keys: Vec<String> = map
            .iter()
            .filter(|(_, e)| matches!(e.get(), Some(Ok(_))))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

// ---------------------------------------------------------------------------
// LazyLoader
// ---------------------------------------------------------------------------

pub struct LazyLoader {
    agent_dir: PathBuf,
    skill_dir: PathBuf,
    agents: LazyMap<AgentDef>,
    skills: LazyMap<SkillDef>,
}

impl LazyLoader {
    pub fn new(agent_dir: impl Into<PathBuf>, skill_dir: impl Into<PathBuf>) -> Self {
        Self {
            agent_dir: agent_dir.into(),
            skill_dir: skill_dir.into(),
            agents: LazyMap::new(),
            skills: LazyMap::new(),
        }
    }

    /// Loader over `~/.warden/agents` and `~/.warden/skills`.
    pub fn open_default() -> Result<Self> {
        let base = paths::warden_base()?;
        Ok(Self::new(paths::agents_dir(&base), paths::skills_dir(&base)))
    }

    pub fn get_agent(&self, name: &str) -> Result<Arc<AgentDef>> {
        let path = self.agent_dir.join(format!("{name}.md"));
        self.agents
            .get_or_load(name, || {
                let data =
                    std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
                Ok(parse_agent(name, &data))
            })
            .map_err(|_| WardenError::AgentNotFound(name.to_string()))
    }

    pub fn get_skill(&self, name: &str) -> Result<Arc<SkillDef>> {
        let path = self.skill_dir.join(name).join("SKILL.md");
        self.skills
            .get_or_load(name, || {
                let data =
                    std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
                Ok(parse_skill(name, &data))
            })
            .map_err(|_| WardenError::SkillNotFound(name.to_string()))
    }

    pub fn is_agent_loaded(&self, name: &str) -> bool {
        self.agents.is_loaded(name)
    }

    pub fn is_skill_loaded(&self, name: &str) -> bool {
        self.skills.is_loaded(name)
    }

    pub fn loaded_agents(&self) -> Vec<String> {
        self.agents.loaded_keys()
    }

    pub fn loaded_skills(&self) -> Vec<String> {
        self.skills.loaded_keys()
    }
}

// ---------------------------------------------------------------------------
// Front-matter extraction
// ---------------------------------------------------------------------------

fn front_matter_value(content: &str, key: &str) -> Option<String> {
    let prefix = format!("{key}:");
    content.lines().find_map(|line| {
        let trimmed = line.trim();
        trimmed
            .strip_prefix(&prefix)
            .map(|rest| rest.trim().to_string())
    })
}

fn parse_agent(name: &str, content: &str) -> AgentDef {
    AgentDef {
        name: name.to_string(),
        description: front_matter_value(content, "description").unwrap_or_default(),
        model: front_matter_value(content, "model"),
        skills: front_matter_value(content, "skills")
            .map(|raw| split_csv(&raw))
            .unwrap_or_default(),
    }
}

fn parse_skill(name: &str, content: &str) -> SkillDef {
    SkillDef {
        name: name.to_string(),
        description: front_matter_value(content, "description").unwrap_or_default(),
        triggers: front_matter_value(content, "triggers")
            .map(|raw| split_csv(&raw))
            .unwrap_or_default(),
        content: content.to_string(),
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader_with_fixtures() -> (TempDir, LazyLoader) {
        let dir = TempDir::new().unwrap();
        let agents = dir.path().join("agents");
        let skills = dir.path().join("skills");
        std::fs::create_dir_all(&agents).unwrap();
        std::fs::create_dir_all(skills.join("webhooks")).unwrap();

        std::fs::write(
            agents.join("backend-engineer.md"),
            "---\ndescription: Server-side implementation\nmodel: default\nskills: rust, sql\n---\n# Backend\n",
        )
        .unwrap();
        std::fs::write(
            skills.join("webhooks").join("SKILL.md"),
            "---\ndescription: Webhook handling\ntriggers: webhook, callback\n---\nbody\n",
        )
        .unwrap();

        let loader = LazyLoader::new(&agents, &skills);
        (dir, loader)
    }

    #[test]
    fn agent_loads_and_parses_front_matter() {
        let (_dir, loader) = loader_with_fixtures();
        let agent = loader.get_agent("backend-engineer").unwrap();
        assert_eq!(agent.description, "Server-side implementation");
        assert_eq!(agent.model.as_deref(), Some("default"));
        assert_eq!(agent.skills, vec!["rust", "sql"]);
    }

    #[test]
    fn skill_loads_triggers_and_content() {
        let (_dir, loader) = loader_with_fixtures();
        let skill = loader.get_skill("webhooks").unwrap();
        assert_eq!(skill.triggers, vec!["webhook", "callback"]);
        assert!(skill.content.contains("body"));
    }

    #[test]
    fn missing_agent_is_a_loader_miss() {
        let (_dir, loader) = loader_with_fixtures();
        assert!(matches!(
            loader.get_agent("ghost"),
            Err(WardenError::AgentNotFound(_))
        ));
        assert!(!loader.is_agent_loaded("ghost"));
    }

    #[test]
    fn load_happens_once_per_name() {
        let (dir, loader) = loader_with_fixtures();
        let first = loader.get_agent("backend-engineer").unwrap();

        // Delete the file: a second get must serve the cached entry.
        std::fs::remove_file(dir.path().join("agents/backend-engineer.md")).unwrap();
        let second = loader.get_agent("backend-engineer").unwrap();
        assert_eq!(first, second);
        assert!(loader.is_agent_loaded("backend-engineer"));
    }

    #[test]
    fn loaded_keys_lists_only_successes() {
        let (_dir, loader) = loader_with_fixtures();
        let _ = loader.get_agent("backend-engineer");
        let _ = loader.get_agent("ghost");
        assert_eq!(loader.loaded_agents(), vec!["backend-engineer"]);
        assert!(loader.loaded_skills().is_empty());
    }
}
