//! JSON persistence for DAG state: one file per session, written
//! atomically after every mutating command.

use super::graph::DagState;
use crate::error::{Result, WardenError};
use crate::{io, paths};
use std::path::{Path, PathBuf};

pub struct DagStore {
    base: PathBuf,
}

impl DagStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(paths::warden_base()?))
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        paths::dag_path(&self.base, session_id)
    }

    pub fn save(&self, state: &DagState) -> Result<()> {
        paths::validate_session_id(&state.session_id)?;
        let data = serde_json::to_vec_pretty(state)?;
        io::atomic_write(&self.path_for(&state.session_id), &data)
    }

    pub fn load(&self, session_id: &str) -> Result<DagState> {
        paths::validate_session_id(session_id)?;
        let path = self.path_for(session_id);
        let data = std::fs::read_to_string(&path)
            .map_err(|_| WardenError::DagNotFound(session_id.to_string()))?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn delete(&self, session_id: &str) -> Result<()> {
        paths::validate_session_id(session_id)?;
        let path = self.path_for(session_id);
        if !path.exists() {
            return Err(WardenError::DagNotFound(session_id.to_string()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.path_for(session_id).exists()
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
