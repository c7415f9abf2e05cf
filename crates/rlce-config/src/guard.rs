//! Unused-key guard.
//!
//! Every leaf of the merged document must sit under a pointer some reader
//! consumes. A misspelt key would otherwise leave its setting at the default
//! without anyone noticing.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Leaf pointers shown in the `Fail` error before the list is cut.
const ERROR_PREVIEW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    /// Daemon driving a real (or bench) radio.
    Enforce,
    /// Offline trace replay through the pure engine.
    Simulate,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Enforce => "ENFORCE",
            ConfigMode::Simulate => "SIMULATE",
        }
    }

    /// JSON pointers read in this mode. A pointer consumes itself and
    /// everything below it.
    pub fn consumed(&self) -> &'static [&'static str] {
        match self {
            ConfigMode::Enforce => &[
                "/vehicle/vehicle_id",
                "/loop",
                "/segment",
                "/window",
                "/legitimacy",
                "/radio",
                "/health",
                "/storage",
            ],
            // Loop timing, health alarms and storage belong to the daemon.
            ConfigMode::Simulate => &[
                "/vehicle/vehicle_id",
                "/segment",
                "/window",
                "/legitimacy",
                "/radio",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub mode: String,
    /// Sorted, deduplicated.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Walk `config_json` and list the leaves nothing in `mode` reads.
///
/// With [`UnusedKeyPolicy::Fail`] a non-empty list is a `CONFIG_UNUSED_KEYS`
/// error; with `Warn` the caller decides how loudly to report it.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: Vec<Vec<&str>> = mode.consumed().iter().map(|p| tokens(p)).collect();

    let mut unused = Vec::new();
    let mut path: Vec<String> = Vec::new();
    visit_leaves(config_json, &mut path, &mut |leaf: &[String]| {
        let covered = consumed
            .iter()
            .any(|c| c.len() <= leaf.len() && c.iter().zip(leaf).all(|(a, b)| *a == b.as_str()));
        if !covered {
            unused.push(render_pointer(leaf));
        }
    });
    unused.sort();
    unused.dedup();

    if policy == UnusedKeyPolicy::Fail && !unused.is_empty() {
        let shown: Vec<&str> = unused.iter().take(ERROR_PREVIEW).map(String::as_str).collect();
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): {} key(s) not read by any component: {}{}",
            mode.as_str(),
            unused.len(),
            shown.join(", "),
            if unused.len() > ERROR_PREVIEW { ", ..." } else { "" }
        );
    }

    Ok(UnusedKeyReport {
        mode: mode.as_str().to_string(),
        unused_leaf_pointers: unused,
    })
}

fn tokens(pointer: &str) -> Vec<&str> {
    pointer.split('/').filter(|t| !t.is_empty()).collect()
}

fn visit_leaves(v: &Value, path: &mut Vec<String>, on_leaf: &mut dyn FnMut(&[String])) {
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                path.push(k.clone());
                visit_leaves(child, path, on_leaf);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(i.to_string());
                visit_leaves(child, path, on_leaf);
                path.pop();
            }
        }
        _ => on_leaf(path),
    }
}

/// RFC 6901 rendering; the document root is "/".
fn render_pointer(path: &[String]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.iter()
        .map(|t| format!("/{}", t.replace('~', "~0").replace('/', "~1")))
        .collect()
}
