use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CellIdentity, CellKey, EpochMillis, Plmn, Rat};

/// Integrity or ciphering algorithm index as reported by the modem
/// (EIA/NIA or EEA/NEA number). Index 0 is the null algorithm.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmId(pub u8);

impl AlgorithmId {
    pub const NULL: AlgorithmId = AlgorithmId(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alg{}", self.0)
    }
}

/// System information broadcast fields relevant to sanity checking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SibInfo {
    pub barred: bool,
    pub q_rx_lev_min_dbm: i32,
    pub broadcast_plmns: Vec<Plmn>,
}

/// Serving-cell telemetry read from the modem on one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServingCellObservation {
    pub plmn: Plmn,
    pub rat: Rat,
    pub channel: u32,
    pub pci: u16,
    pub cell_id: u64,
    pub tac: u32,
    pub rsrp_dbm: f64,
    pub rsrq_db: f64,
    pub sinr_db: f64,
    /// `None` when the modem could not report the negotiated algorithm.
    pub integrity_alg: Option<AlgorithmId>,
    pub cipher_alg: Option<AlgorithmId>,
    pub sib: SibInfo,
    pub observed_at_ms: EpochMillis,
}

impl ServingCellObservation {
    pub fn key(&self) -> CellKey {
        CellKey {
            plmn: self.plmn.clone(),
            rat: self.rat,
            channel: self.channel,
            pci: self.pci,
        }
    }

    pub fn identity(&self) -> CellIdentity {
        CellIdentity {
            key: self.key(),
            cell_id: self.cell_id,
            tac: self.tac,
        }
    }
}
