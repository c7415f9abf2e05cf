//! Process environment read at start.

use anyhow::{bail, Result};

pub const ENV_CONFIG: &str = "RLCE_CONFIG";
pub const ENV_PROFILE: &str = "RLCE_PROFILE";
pub const ENV_TRACE: &str = "RLCE_TRACE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonEnv {
    /// YAML layers, merged in order.
    pub config_paths: Vec<String>,
    pub profile_path: String,
    /// Bench radio binding: replay this JSONL trace instead of a modem.
    pub trace_path: Option<String>,
}

impl DaemonEnv {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_paths: Vec<String> = get(ENV_CONFIG)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if config_paths.is_empty() {
            bail!("{ENV_CONFIG} is not set (comma-separated YAML paths)");
        }

        let profile_path = match get(ENV_PROFILE) {
            Some(p) if !p.trim().is_empty() => p.trim().to_string(),
            _ => bail!("{ENV_PROFILE} is not set"),
        };

        let trace_path = get(ENV_TRACE)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Ok(Self {
            config_paths,
            profile_path,
            trace_path,
        })
    }
}
