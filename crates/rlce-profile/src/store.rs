use rlce_schemas::RouteProfile;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::{validate_profile, ProfileError};

/// Holder of the active route profile.
///
/// Readers take an `Arc` snapshot for the duration of a tick, so a swap
/// never shows a tick half of one epoch and half of another.
#[derive(Debug, Default)]
pub struct ProfileStore {
    current: RwLock<Option<Arc<RouteProfile>>>,
}

impl ProfileStore {
    /// Empty store. The engine stays blocked until a profile is loaded.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: RouteProfile) -> Result<Self, ProfileError> {
        let store = Self::new();
        store.load(profile)?;
        Ok(store)
    }

    /// Validate and install `profile`. On error the previous profile (if
    /// any) stays active.
    pub fn load(&self, profile: RouteProfile) -> Result<Arc<RouteProfile>, ProfileError> {
        validate_profile(&profile)?;

        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        if let Some(active) = guard.as_ref() {
            if profile.epoch <= active.epoch {
                return Err(ProfileError::StaleEpoch {
                    current: active.epoch,
                    offered: profile.epoch,
                });
            }
        }
        let installed = Arc::new(profile);
        *guard = Some(Arc::clone(&installed));
        Ok(installed)
    }

    pub fn current(&self) -> Option<Arc<RouteProfile>> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn epoch(&self) -> Option<u64> {
        self.current().map(|p| p.epoch)
    }
}

/// Parse a profile document. Does not validate.
pub fn decode_profile_json(raw: &str) -> Result<RouteProfile, ProfileError> {
    serde_json::from_str(raw).map_err(|e| ProfileError::Decode(e.to_string()))
}

/// Read and parse a profile document from disk. Does not validate.
pub fn load_profile_json(path: impl AsRef<Path>) -> Result<RouteProfile, ProfileError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ProfileError::Decode(format!("read {}: {e}", path.display())))?;
    decode_profile_json(&raw)
}
