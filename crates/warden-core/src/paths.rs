use crate::error::{Result, WardenError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const WARDEN_DIR: &str = ".warden";

pub const GATES_DIR: &str = "gates";
pub const SESSION_DIR: &str = "session";
pub const DAG_DIR: &str = "dag";
pub const CHAIN_DIR: &str = "chain";
pub const AGENTS_DIR: &str = "agents";
pub const SKILLS_DIR: &str = "skills";

pub const GATES_CONFIG_FILE: &str = "config.json";

// ---------------------------------------------------------------------------
// Base resolution
// ---------------------------------------------------------------------------

/// Resolve `~/.warden`, the base directory for all sidecar state.
///
/// Every store type also accepts an explicit base so tests never touch the
/// real home directory.
pub fn warden_base() -> Result<PathBuf> {
    home::home_dir()
        .map(|h| h.join(WARDEN_DIR))
        .ok_or(WardenError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn gates_config_path(base: &Path) -> PathBuf {
    base.join(GATES_DIR).join(GATES_CONFIG_FILE)
}

pub fn session_path(base: &Path, session_id: &str) -> PathBuf {
    base.join(SESSION_DIR).join(format!("{session_id}.json"))
}

pub fn dag_path(base: &Path, session_id: &str) -> PathBuf {
    base.join(DAG_DIR).join(format!("{session_id}.json"))
}

pub fn chain_dir(base: &Path) -> PathBuf {
    base.join(CHAIN_DIR)
}

pub fn agents_dir(base: &Path) -> PathBuf {
    base.join(AGENTS_DIR)
}

pub fn skills_dir(base: &Path) -> PathBuf {
    base.join(SKILLS_DIR)
}

// ---------------------------------------------------------------------------
// Session id validation
// ---------------------------------------------------------------------------

static SESSION_ID_RE: OnceLock<Regex> = OnceLock::new();

fn session_id_re() -> &'static Regex {
    SESSION_ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap())
}

/// Session ids become file names under `~/.warden/`, so anything that
/// could traverse out of the state directories is rejected.
pub fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 128 || !session_id_re().is_match(id) {
        return Err(WardenError::InvalidSessionId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_session_ids() {
        for id in ["abc", "sess-01", "a.b_c-d", "0f3e2d", "UUID-Like-1234"] {
            validate_session_id(id).unwrap_or_else(|_| panic!("expected valid: {id}"));
        }
    }

    #[test]
    fn invalid_session_ids() {
        for id in ["", "../escape", "a/b", ".hidden", "-leading", &"x".repeat(129)] {
            assert!(validate_session_id(id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn path_helpers() {
        let base = Path::new("/tmp/wd");
        assert_eq!(
            gates_config_path(base),
            PathBuf::from("/tmp/wd/gates/config.json")
        );
        assert_eq!(
            session_path(base, "s1"),
            PathBuf::from("/tmp/wd/session/s1.json")
        );
        assert_eq!(dag_path(base, "s1"), PathBuf::from("/tmp/wd/dag/s1.json"));
        assert_eq!(chain_dir(base), PathBuf::from("/tmp/wd/chain"));
    }
}
