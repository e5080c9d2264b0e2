//! Per-session state shared across sidecar invocations.
//!
//! One JSON file per session id under `~/.warden/session/`. Two concurrent
//! invocations resolve by last-writer-wins; the host serializes hook calls
//! per session, so no cross-process locking is needed.

use crate::error::Result;
use crate::{io, paths};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Session {
    pub id: String,
    pub project: String,
    /// Day stamp, `YYYY-MM-DD`.
    pub today: String,
    pub research_done: bool,
    pub memory_queried: bool,
    pub tasks_created: u32,
    pub tasks_completed: u32,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project: detect_project(),
            today: Utc::now().format("%Y-%m-%d").to_string(),
            research_done: false,
            memory_queried: false,
            tasks_created: 0,
            tasks_completed: 0,
        }
    }
}

/// Project name: the working directory's file name.
fn detect_project() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string())
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

pub struct SessionStore {
    base: PathBuf,
}

impl SessionStore {
    /// Store rooted at an explicit base directory (tests pass a tempdir).
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Store rooted at `~/.warden`.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(paths::warden_base()?))
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        paths::session_path(&self.base, session_id)
    }

    /// Read the session file, or return a fresh default-valued session.
    pub fn get_or_create(&self, session_id: &str) -> Result<Session> {
        paths::validate_session_id(session_id)?;
        let path = self.path_for(session_id);
        let Ok(data) = std::fs::read_to_string(&path) else {
            return Ok(Session::new(session_id));
        };
        match serde_json::from_str::<Session>(&data) {
            Ok(mut session) => {
                // Files written by hand may omit the id.
                if session.id.is_empty() {
                    session.id = session_id.to_string();
                }
                Ok(session)
            }
            // A corrupt file is replaced on the next save.
            Err(_) => Ok(Session::new(session_id)),
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        paths::validate_session_id(&session.id)?;
        let data = serde_json::to_vec_pretty(session)?;
        io::atomic_write(&self.path_for(&session.id), &data)
    }
}

// ---------------------------------------------------------------------------
// CLAUDE_ENV_FILE export
// ---------------------------------------------------------------------------

/// Append the session's variables to the host env file so every later
/// shell command sees them. Other hooks append to the same file.
pub fn write_env_file(session: &Session, env_file: &Path, memory_bank: &Path) -> Result<()> {
    let content = format!(
        "WARDEN_SESSION_ID={}\nWARDEN_PROJECT={}\nWARDEN_MEMORY_BANK={}\nWARDEN_TODAY={}\nWARDEN_RESEARCH_DONE={}\n",
        session.id,
        session.project,
        memory_bank.display(),
        session.today,
        session.research_done,
    );
    io::append_private(env_file, &content)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let session = store.get_or_create("fresh").unwrap();
        assert_eq!(session.id, "fresh");
        assert!(!session.research_done);
        assert_eq!(session.tasks_created, 0);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());

        let mut session = store.get_or_create("s1").unwrap();
        session.research_done = true;
        session.tasks_created = 3;
        store.save(&session).unwrap();

        let loaded = store.get_or_create("s1").unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn corrupt_file_recovers_to_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let path = store.path_for("bad");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{{{{").unwrap();

        let session = store.get_or_create("bad").unwrap();
        assert_eq!(session.id, "bad");
        assert!(!session.research_done);
    }

    #[test]
    fn traversal_session_id_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.get_or_create("../../etc/passwd").is_err());
    }

    #[test]
    fn env_file_export() {
        let dir = TempDir::new().unwrap();
        let env_file = dir.path().join("claude.env");
        let mut session = Session::new("s9");
        session.research_done = true;
        write_env_file(&session, &env_file, Path::new("/mem/bank")).unwrap();

        let content = std::fs::read_to_string(&env_file).unwrap();
        assert!(content.contains("WARDEN_SESSION_ID=s9"));
        assert!(content.contains("WARDEN_RESEARCH_DONE=true"));
        assert!(content.contains("WARDEN_MEMORY_BANK=/mem/bank"));
    }
}
