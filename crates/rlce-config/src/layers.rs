//! Layer merge, canonical form and hash.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::EnforcementConfig;

/// Merged configuration plus the identity it is logged under.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Lowercase hex SHA-256 of `canonical_json`.
    pub config_hash: String,
    /// Compact JSON with object keys in sorted order.
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed, validated view of the merged document.
    pub fn enforcement(&self) -> Result<EnforcementConfig> {
        EnforcementConfig::from_config_json(&self.config_json)
    }
}

/// Read and merge YAML files, first path is the base layer.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("read config layer {p}")))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let layer: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("config layer {i}: invalid yaml"))?;
        // A blank file parses as null and contributes nothing.
        if layer.is_null() {
            continue;
        }
        let layer = serde_json::to_value(layer)
            .with_context(|| format!("config layer {i}: not representable as json"))?;
        overlay(&mut merged, layer);
    }

    let canonical_json =
        serde_json::to_string(&sorted(&merged)).context("serialize canonical config")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge key by key; anything else in `top` replaces `base`.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(b), Value::Object(t)) => {
            for (k, v) in t {
                match b.get_mut(&k) {
                    Some(existing) => overlay(existing, v),
                    None => {
                        b.insert(k, v);
                    }
                }
            }
        }
        (slot, top) => *slot = top,
    }
}

/// Copy of `v` with every object's keys in order.
fn sorted(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
