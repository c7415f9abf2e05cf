use rlce_config::{EnforcementConfig, Q_RX_LEV_MIN_RANGE_DBM};
use rlce_engine::{EngineParams, DEFAULT_HISTORY_LEN};
use rlce_legitimacy::LegitimacyParameters;
use rlce_segment::SegmentParams;
use std::time::Duration;

/// Loop timing and buffering taken from the enforcement config.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub vehicle_id: String,
    pub tick_interval: Duration,
    pub io_timeout: Duration,
    pub retry_budget: u32,
    pub event_buffer_capacity: usize,
}

impl RuntimeSettings {
    pub fn from_config(cfg: &EnforcementConfig) -> Self {
        Self {
            vehicle_id: cfg.vehicle.vehicle_id.clone(),
            tick_interval: Duration::from_millis(cfg.tick_loop.tick_interval_ms),
            io_timeout: Duration::from_millis(cfg.tick_loop.io_timeout_ms),
            retry_budget: cfg.health.retry_budget,
            event_buffer_capacity: cfg.health.event_buffer_capacity,
        }
    }
}

pub fn engine_params(cfg: &EnforcementConfig) -> EngineParams {
    EngineParams {
        grace: cfg.window.grace,
        segment: SegmentParams {
            hysteresis_ms: ms(cfg.segment.hysteresis_ms),
            switch_margin_m: cfg.segment.switch_margin_m,
            unmatched_timeout_ms: ms(cfg.segment.unmatched_timeout_ms),
        },
        reselect_retry_ms: cfg.radio.reselect_retry_ms.map(ms),
        lock_cell_escalation: cfg.radio.lock_cell_escalation,
        radio_pinning: cfg.radio.radio_pinning,
        history_len: DEFAULT_HISTORY_LEN,
    }
}

pub fn legitimacy_params(cfg: &EnforcementConfig) -> LegitimacyParameters {
    let l = &cfg.legitimacy;
    LegitimacyParameters {
        allowed_plmns: l.allowed_plmns.clone(),
        tac_delta_max: l.tac_delta_max,
        allowed_lte_channels: l.allowed_channels.lte.clone(),
        allowed_nr_channels: l.allowed_channels.nr.clone(),
        pci_reserved: l.pci.reserved.clone(),
        q_rx_lev_min_range_dbm: Q_RX_LEV_MIN_RANGE_DBM,
    }
}

fn ms(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
