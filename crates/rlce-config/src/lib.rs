//! rlce-config
//!
//! Layered YAML configuration for the enforcement daemon and tools.
//!
//! - Documents are merged in order: earlier layers are the base, later layers
//!   override (fleet defaults -> route -> vehicle -> bench overrides ...).
//! - The merged document is canonicalised (sorted keys, compact JSON) and
//!   hashed with SHA-256 so every event log session can name the exact
//!   configuration it ran under.
//! - An unused-key guard catches misspelt keys, which in a fail-closed
//!   system would otherwise silently fall back to a default.
//! - [`EnforcementConfig`] is the typed view, validated against the ranges
//!   the decision loop depends on.

mod enforcement;
mod guard;
mod layers;

pub use enforcement::*;
pub use guard::{report_unused_keys, ConfigMode, UnusedKeyPolicy, UnusedKeyReport};
pub use layers::{load_layered_yaml, load_layered_yaml_from_strings, LoadedConfig};
