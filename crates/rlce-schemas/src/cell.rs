use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public land mobile network id: MCC (3 digits) + MNC (2 or 3 digits).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plmn(pub String);

impl Plmn {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the id is 5 or 6 ASCII digits.
    pub fn is_well_formed(&self) -> bool {
        let len = self.0.len();
        (len == 5 || len == 6) && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Radio access technology.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rat {
    Lte,
    Nr,
}

impl Rat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rat::Lte => "LTE",
            Rat::Nr => "NR",
        }
    }

    /// Highest physical cell id defined for this RAT.
    pub fn max_pci(&self) -> u16 {
        match self {
            Rat::Lte => 503,
            Rat::Nr => 1007,
        }
    }
}

impl fmt::Display for Rat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniqueness key of a CAL entry within one segment.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub plmn: Plmn,
    pub rat: Rat,
    /// EARFCN (LTE) or NR-ARFCN (NR).
    pub channel: u32,
    pub pci: u16,
}

/// Full identity of a cell as used for window membership: the [`CellKey`]
/// plus the global cell id and tracking area code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellIdentity {
    pub key: CellKey,
    pub cell_id: u64,
    pub tac: u32,
}

impl fmt::Display for CellIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/ch{}/pci{}/cid{}/tac{}",
            self.key.plmn, self.key.rat, self.key.channel, self.key.pci, self.cell_id, self.tac
        )
    }
}

/// Survey-derived mean and standard deviation of one RF metric.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricBaseline {
    pub mean: f64,
    pub stddev: f64,
}

impl MetricBaseline {
    pub fn new(mean: f64, stddev: f64) -> Self {
        Self { mean, stddev }
    }

    /// `mean - stddev <= x <= mean + stddev`.
    pub fn contains(&self, x: f64) -> bool {
        x.is_finite() && x >= self.mean - self.stddev && x <= self.mean + self.stddev
    }

    pub fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.stddev.is_finite() && self.stddev >= 0.0
    }
}

/// RF envelope for the three metrics checked by the legitimacy evaluator.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RfBaseline {
    pub rsrp: MetricBaseline,
    pub rsrq: MetricBaseline,
    pub sinr: MetricBaseline,
}

impl RfBaseline {
    pub fn is_valid(&self) -> bool {
        self.rsrp.is_valid() && self.rsrq.is_valid() && self.sinr.is_valid()
    }
}

/// One authorized cell in a segment's Cell Access List.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalEntry {
    pub plmn: Plmn,
    pub rat: Rat,
    pub channel: u32,
    pub pci: u16,
    pub cell_id: u64,
    pub tac: u32,
    pub baseline_rsrp: MetricBaseline,
    pub baseline_rsrq: MetricBaseline,
    pub baseline_sinr: MetricBaseline,
    pub last_validated: DateTime<Utc>,
    /// Opaque upstream signature; verification happens before the profile
    /// reaches the engine.
    #[serde(default)]
    pub signature: String,
}

impl CalEntry {
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

    pub fn baseline(&self) -> RfBaseline {
        RfBaseline {
            rsrp: self.baseline_rsrp,
            rsrq: self.baseline_rsrq,
            sinr: self.baseline_sinr,
        }
    }
}
