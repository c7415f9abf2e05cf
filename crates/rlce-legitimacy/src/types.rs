use rlce_profile::AuthorizedWindow;
use rlce_schemas::{LegitimacyChecks, Plmn, RfBaseline};
use std::collections::{BTreeMap, BTreeSet};

/// SIB qRxLevMin acceptance range in dBm.
pub const Q_RX_LEV_MIN_RANGE_DBM: (i32, i32) = (-125, -85);

/// Configured thresholds.
#[derive(Clone, Debug, PartialEq)]
pub struct LegitimacyParameters {
    /// P
    pub allowed_plmns: BTreeSet<Plmn>,
    pub tac_delta_max: u32,
    /// F
    pub allowed_lte_channels: BTreeSet<u32>,
    /// F_NR
    pub allowed_nr_channels: BTreeSet<u32>,
    /// Channel -> PCIs reserved for adjacent or forbidden sectors.
    pub pci_reserved: BTreeMap<u32, BTreeSet<u16>>,
    pub q_rx_lev_min_range_dbm: (i32, i32),
}

impl Default for LegitimacyParameters {
    fn default() -> Self {
        Self {
            allowed_plmns: BTreeSet::new(),
            tac_delta_max: 1,
            allowed_lte_channels: BTreeSet::new(),
            allowed_nr_channels: BTreeSet::new(),
            pci_reserved: BTreeMap::new(),
            q_rx_lev_min_range_dbm: Q_RX_LEV_MIN_RANGE_DBM,
        }
    }
}

/// What the evaluator may look at besides the observation itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvaluationContext<'a> {
    /// Window of the committed segment, if one is established.
    pub window: Option<&'a AuthorizedWindow>,
    /// Route-wide baseline from the profile.
    pub route_baseline: Option<&'a RfBaseline>,
}

/// Per-check outcome plus the aggregate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LegitimacyResult {
    pub checks: LegitimacyChecks,
    /// Logical AND of all seven checks.
    pub pass: bool,
    /// Envelope the RF check was run against, if any applied.
    pub baseline: Option<RfBaseline>,
}
