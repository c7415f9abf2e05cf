use anyhow::{bail, Context, Result};
use rlce_schemas::Plmn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Allowed decision-loop cadence, in milliseconds.
pub const TICK_INTERVAL_RANGE_MS: (u64, u64) = (200, 500);

/// Largest grace window accepted. Beyond this the authorized window stops
/// meaning "near the vehicle".
pub const MAX_GRACE: usize = 3;

/// SIB qRxLevMin acceptance range in dBm. Fixed, not configurable.
pub const Q_RX_LEV_MIN_RANGE_DBM: (i32, i32) = (-125, -85);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcementConfig {
    pub vehicle: VehicleConfig,
    #[serde(rename = "loop")]
    pub tick_loop: LoopConfig,
    pub segment: SegmentConfig,
    pub window: WindowConfig,
    pub legitimacy: LegitimacyConfig,
    pub radio: RadioConfig,
    pub health: HealthConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub vehicle_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Decision tick interval Δt.
    pub tick_interval_ms: u64,
    /// Upper bound on any single ModemPort / PositionPort call. Must be < Δt.
    pub io_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Dwell time δ a candidate segment must persist before it is committed.
    pub hysteresis_ms: u64,
    /// Extra distance by which a candidate must beat the committed segment.
    pub switch_margin_m: f64,
    /// Position unmatched / lost for longer than this forces BLOCKED.
    pub unmatched_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Number of neighbouring segments on each side whose CALs are authorized.
    pub grace: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChannelSets {
    pub lte: BTreeSet<u32>,
    pub nr: BTreeSet<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PciConfig {
    /// Channel -> PCIs reserved for adjacent or forbidden sectors.
    pub reserved: BTreeMap<u32, BTreeSet<u16>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegitimacyConfig {
    pub allowed_plmns: BTreeSet<Plmn>,
    pub tac_delta_max: u32,
    pub allowed_channels: ChannelSets,
    pub pci: PciConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Re-issue deregister + reselect at this cadence while blocked on the
    /// same rejected cell. Defaults to 2 s when the key is absent; an
    /// explicit `null` issues them once per blocked episode.
    pub reselect_retry_ms: Option<u64>,
    /// When a reselect retry fires, also lock onto the best window cell.
    pub lock_cell_escalation: bool,
    /// Push band mask / PLMN restrictions whenever the window changes.
    pub radio_pinning: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures of one collaborator before an operator alarm.
    pub retry_budget: u32,
    /// Pending event records held while the event sink is failing.
    pub event_buffer_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_path: String,
    pub audit_path: String,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            vehicle: VehicleConfig::default(),
            tick_loop: LoopConfig::default(),
            segment: SegmentConfig::default(),
            window: WindowConfig::default(),
            legitimacy: LegitimacyConfig::default(),
            radio: RadioConfig::default(),
            health: HealthConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            vehicle_id: "UNSET".to_string(),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            io_timeout_ms: 150,
        }
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            hysteresis_ms: 2_000,
            switch_margin_m: 0.0,
            unmatched_timeout_ms: 5_000,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { grace: 1 }
    }
}

impl Default for LegitimacyConfig {
    fn default() -> Self {
        Self {
            allowed_plmns: BTreeSet::new(),
            tac_delta_max: 1,
            allowed_channels: ChannelSets::default(),
            pci: PciConfig::default(),
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            reselect_retry_ms: Some(2_000),
            lock_cell_escalation: false,
            radio_pinning: false,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            event_buffer_capacity: 1024,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: "var/rlce/state.json".to_string(),
            audit_path: "var/rlce/events.jsonl".to_string(),
        }
    }
}

impl EnforcementConfig {
    /// Build from the merged config JSON (produced by [`crate::load_layered_yaml`]).
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let parsed: EnforcementConfig = serde_json::from_value(cfg.clone())
            .context("CONFIG_INVALID: does not match the enforcement schema")?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Range checks. Every violation is fatal: the daemon refuses to start
    /// rather than run with a value the timing guarantees do not cover.
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = TICK_INTERVAL_RANGE_MS;
        let dt = self.tick_loop.tick_interval_ms;
        if !(lo..=hi).contains(&dt) {
            bail!("CONFIG_INVALID loop.tick_interval_ms={dt} must be within [{lo}, {hi}]");
        }
        let io = self.tick_loop.io_timeout_ms;
        if io == 0 || io >= dt {
            bail!("CONFIG_INVALID loop.io_timeout_ms={io} must be > 0 and < tick_interval_ms={dt}");
        }

        if self.window.grace > MAX_GRACE {
            bail!(
                "CONFIG_INVALID window.grace={} must be <= {MAX_GRACE}",
                self.window.grace
            );
        }

        let margin = self.segment.switch_margin_m;
        if !margin.is_finite() || margin < 0.0 {
            bail!("CONFIG_INVALID segment.switch_margin_m={margin} must be finite and >= 0");
        }
        if self.segment.unmatched_timeout_ms == 0 {
            bail!("CONFIG_INVALID segment.unmatched_timeout_ms must be > 0");
        }

        if self.legitimacy.allowed_plmns.is_empty() {
            bail!("CONFIG_INVALID legitimacy.allowed_plmns must not be empty");
        }
        if let Some(bad) = self
            .legitimacy
            .allowed_plmns
            .iter()
            .find(|p| !p.is_well_formed())
        {
            bail!("CONFIG_INVALID legitimacy.allowed_plmns contains malformed PLMN '{bad}'");
        }

        if let Some(retry) = self.radio.reselect_retry_ms {
            if retry < dt {
                bail!(
                    "CONFIG_INVALID radio.reselect_retry_ms={retry} must be >= tick_interval_ms={dt}"
                );
            }
        }
        if self.radio.lock_cell_escalation && self.radio.reselect_retry_ms.is_none() {
            bail!("CONFIG_INVALID radio.lock_cell_escalation requires radio.reselect_retry_ms");
        }

        if self.health.retry_budget == 0 {
            bail!("CONFIG_INVALID health.retry_budget must be > 0");
        }
        if self.health.event_buffer_capacity == 0 {
            bail!("CONFIG_INVALID health.event_buffer_capacity must be > 0");
        }

        if self.storage.state_path.trim().is_empty() || self.storage.audit_path.trim().is_empty()
        {
            bail!("CONFIG_INVALID storage paths must not be empty");
        }

        Ok(())
    }
}
