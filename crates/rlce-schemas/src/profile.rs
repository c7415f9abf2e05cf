use serde::{Deserialize, Serialize};

use crate::{CalEntry, PlanarPoint, RfBaseline};

/// Upstream signature verification outcome. Only `Verified` profiles are
/// ever loaded by the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Unverified,
}

/// Extent of a segment, used to match a position sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentExtent {
    /// Polyline centre-line; a planar fix matches when within `corridor_m`.
    Path {
        points: Vec<PlanarPoint>,
        corridor_m: f64,
    },
    /// Half-open chainage interval `[start_m, end_m)`.
    Chainage { start_m: f64, end_m: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub extent: SegmentExtent,
    pub cal: Vec<CalEntry>,
}

/// Ordered route segments for one validity epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteProfile {
    pub route_id: String,
    pub epoch: u64,
    pub verification: VerificationStatus,
    pub segments: Vec<Segment>,
    /// Route-wide RF envelope used when no CAL entry baseline applies.
    #[serde(default)]
    pub route_baseline: Option<RfBaseline>,
}

impl RouteProfile {
    pub fn last_index(&self) -> Option<usize> {
        self.segments.len().checked_sub(1)
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn is_verified(&self) -> bool {
        self.verification == VerificationStatus::Verified
    }
}
