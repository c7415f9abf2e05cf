use rlce_schemas::CellKey;
use std::fmt;

/// Why a route profile was refused. The store keeps its last-good profile.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileError {
    /// Upstream signature verification did not mark the profile verified.
    Unverified { route_id: String },
    /// The profile has no segments.
    EmptyProfile,
    /// Segment at `position` carries `found` instead of its position.
    NonContiguousIndex { position: usize, found: usize },
    /// Two CAL entries in one segment share a (PLMN, RAT, channel, PCI).
    DuplicateCalEntry { segment: usize, key: CellKey },
    /// A baseline is non-finite or has a negative stddev. `segment` is
    /// `None` for the route-wide baseline.
    InvalidBaseline {
        segment: Option<usize>,
        detail: String,
    },
    /// A segment extent cannot match any position.
    InvalidExtent { segment: usize, detail: String },
    /// Offered epoch is not newer than the one already loaded.
    StaleEpoch { current: u64, offered: u64 },
    /// The profile document could not be read or parsed.
    Decode(String),
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::Unverified { route_id } => {
                write!(f, "PROFILE_INVALID route {route_id} is not verified")
            }
            ProfileError::EmptyProfile => write!(f, "PROFILE_INVALID profile has no segments"),
            ProfileError::NonContiguousIndex { position, found } => write!(
                f,
                "PROFILE_INVALID segment at position {position} has index {found}"
            ),
            ProfileError::DuplicateCalEntry { segment, key } => write!(
                f,
                "PROFILE_INVALID segment {segment} lists {}/{}/ch{}/pci{} more than once",
                key.plmn, key.rat, key.channel, key.pci
            ),
            ProfileError::InvalidBaseline {
                segment: Some(s),
                detail,
            } => write!(f, "PROFILE_INVALID segment {s} baseline: {detail}"),
            ProfileError::InvalidBaseline {
                segment: None,
                detail,
            } => write!(f, "PROFILE_INVALID route baseline: {detail}"),
            ProfileError::InvalidExtent { segment, detail } => {
                write!(f, "PROFILE_INVALID segment {segment} extent: {detail}")
            }
            ProfileError::StaleEpoch { current, offered } => write!(
                f,
                "PROFILE_STALE offered epoch {offered} is not newer than loaded epoch {current}"
            ),
            ProfileError::Decode(msg) => write!(f, "PROFILE_DECODE {msg}"),
        }
    }
}

impl std::error::Error for ProfileError {}
