use anyhow::{Context, Result};
use rlce_engine::EnforcementState;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// On-disk wrapper around [`EnforcementState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub saved_at_ms: i64,
    pub state: EnforcementState,
}

/// Durable engine state: one JSON document replaced atomically.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing was ever saved.
    pub fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read state {:?}", self.path))?;
        let parsed: PersistedState = serde_json::from_str(&raw)
            .with_context(|| format!("STATE_CORRUPT: decode {:?}", self.path))?;
        Ok(Some(parsed))
    }

    /// Write to a sibling temp file, fsync, then rename over the target.
    /// A crash leaves either the old or the new document, never a mix.
    pub fn save(&self, state: &EnforcementState, saved_at_ms: i64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }
        let doc = PersistedState {
            saved_at_ms,
            state: state.clone(),
        };
        let body = serde_json::to_vec_pretty(&doc).context("encode state")?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut f = File::create(&tmp).with_context(|| format!("create {:?}", tmp))?;
            f.write_all(&body)
                .with_context(|| format!("write {:?}", tmp))?;
            f.sync_all().with_context(|| format!("fsync {:?}", tmp))?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {:?} -> {:?}", tmp, self.path))?;
        Ok(())
    }
}
