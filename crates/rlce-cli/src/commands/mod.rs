//! Command handler modules for the `rlce` CLI.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules. Handlers return the
//! lines to print so they can be tested without spawning the binary.

pub mod profile;
pub mod simulate;

use anyhow::{bail, Context, Result};
use rlce_audit::{verify_hash_chain, VerifyResult};
use rlce_config::{
    load_layered_yaml, report_unused_keys, ConfigMode, EnforcementConfig, LoadedConfig,
    UnusedKeyPolicy,
};
use rlce_runtime::StateStore;
use tracing::warn;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load the layers and the typed view. `strict` turns unused keys into an
/// error instead of a warning.
pub fn load_config(
    paths: &[String],
    mode: ConfigMode,
    strict: bool,
) -> Result<(LoadedConfig, EnforcementConfig)> {
    let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&refs)?;
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(mode, &loaded.config_json, policy)?;
    for key in &report.unused_leaf_pointers {
        warn!(key = %key, mode = mode.as_str(), "unused config key");
    }
    let cfg = loaded.enforcement()?;
    Ok((loaded, cfg))
}

// ---------------------------------------------------------------------------
// Small commands
// ---------------------------------------------------------------------------

pub fn audit_verify(path: &str) -> Result<Vec<String>> {
    match verify_hash_chain(path).with_context(|| format!("read {path}"))? {
        VerifyResult::Valid { lines, last_hash } => Ok(vec![format!(
            "audit_ok lines={} last_hash={}",
            lines,
            last_hash.as_deref().unwrap_or("-")
        )]),
        VerifyResult::Broken { line, reason } => {
            bail!("AUDIT_CHAIN_BROKEN line={line}: {reason}")
        }
    }
}

pub fn state_show(path: &str) -> Result<Vec<String>> {
    match StateStore::new(path).load()? {
        Some(p) => {
            let body = serde_json::to_string_pretty(&p).context("encode state")?;
            Ok(body.lines().map(str::to_string).collect())
        }
        None => Ok(vec![format!("no_state path={path}")]),
    }
}
