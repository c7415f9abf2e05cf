//! Reference route and cells used across scenario tests and the demo files.

use rlce_legitimacy::LegitimacyParameters;
use rlce_schemas::{
    AlgorithmId, CalEntry, MetricBaseline, Plmn, Rat, RouteProfile, Segment, SegmentExtent,
    ServingCellObservation, SibInfo, VerificationStatus,
};

pub const DEMO_PLMN: &str = "310260";
pub const DEMO_LTE_CHANNELS: [u32; 5] = [66486, 66490, 66500, 5140, 1302];
pub const DEMO_NR_CHANNELS: [u32; 2] = [523800, 627936];

/// Segment length of [`demo_profile`], in metres of chainage.
pub const DEMO_SEGMENT_M: f64 = 1_000.0;

pub fn demo_cal(pci: u16, tac: u32, channel: u32) -> CalEntry {
    CalEntry {
        plmn: Plmn::new(DEMO_PLMN),
        rat: Rat::Lte,
        channel,
        pci,
        cell_id: 81_000_000 + u64::from(pci),
        tac,
        baseline_rsrp: MetricBaseline::new(-95.0, 6.0),
        baseline_rsrq: MetricBaseline::new(-10.0, 3.0),
        baseline_sinr: MetricBaseline::new(12.0, 5.0),
        last_validated: chrono::DateTime::from_timestamp(1_772_323_200, 0).unwrap_or_default(),
        signature: String::new(),
    }
}

/// Five chainage segments, one LTE cell each, TACs 8123..=8127. Segment 0
/// carries the 66486 / PCI 123 / TAC 8123 cell.
pub fn demo_profile(epoch: u64) -> RouteProfile {
    let cells = [
        (123, 8123, 66486),
        (124, 8124, 66486),
        (210, 8125, 66490),
        (211, 8126, 66490),
        (305, 8127, 66500),
    ];
    RouteProfile {
        route_id: "DEMO-LINE".to_string(),
        epoch,
        verification: VerificationStatus::Verified,
        segments: cells
            .iter()
            .enumerate()
            .map(|(i, (pci, tac, ch))| Segment {
                index: i,
                extent: SegmentExtent::Chainage {
                    start_m: i as f64 * DEMO_SEGMENT_M,
                    end_m: (i + 1) as f64 * DEMO_SEGMENT_M,
                },
                cal: vec![demo_cal(*pci, *tac, *ch)],
            })
            .collect(),
        route_baseline: None,
    }
}

pub fn demo_legitimacy() -> LegitimacyParameters {
    LegitimacyParameters {
        allowed_plmns: [Plmn::new(DEMO_PLMN), Plmn::new("311480")].into(),
        tac_delta_max: 1,
        allowed_lte_channels: DEMO_LTE_CHANNELS.into(),
        allowed_nr_channels: DEMO_NR_CHANNELS.into(),
        ..LegitimacyParameters::default()
    }
}

/// What the modem reports while camped on `cal`, at the baseline means.
pub fn observe(cal: &CalEntry) -> ServingCellObservation {
    ServingCellObservation {
        plmn: cal.plmn.clone(),
        rat: cal.rat,
        channel: cal.channel,
        pci: cal.pci,
        cell_id: cal.cell_id,
        tac: cal.tac,
        rsrp_dbm: cal.baseline_rsrp.mean,
        rsrq_db: cal.baseline_rsrq.mean,
        sinr_db: cal.baseline_sinr.mean,
        integrity_alg: Some(AlgorithmId(2)),
        cipher_alg: Some(AlgorithmId(2)),
        sib: SibInfo {
            barred: false,
            q_rx_lev_min_dbm: -120,
            broadcast_plmns: vec![cal.plmn.clone()],
        },
        observed_at_ms: 0,
    }
}

/// Unlisted cell that fails PLMN, TAC, channel, RF and PCI checks.
pub fn rogue_cell() -> ServingCellObservation {
    ServingCellObservation {
        plmn: Plmn::new("001010"),
        rat: Rat::Lte,
        channel: 99999,
        pci: 999,
        cell_id: 1,
        tac: 5000,
        rsrp_dbm: -50.0,
        rsrq_db: -10.0,
        sinr_db: 12.0,
        integrity_alg: Some(AlgorithmId::NULL),
        cipher_alg: Some(AlgorithmId::NULL),
        sib: SibInfo {
            barred: false,
            q_rx_lev_min_dbm: -120,
            broadcast_plmns: vec![Plmn::new("001010")],
        },
        observed_at_ms: 0,
    }
}
