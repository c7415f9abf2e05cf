use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic-enablement decision.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Serving cell is in the authorized window.
    Allowed,
    /// Serving cell is outside the window but passed every legitimacy check.
    FailOpen,
    /// Authorization could not be established. Fail-closed default.
    Blocked,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allowed => "ALLOWED",
            Decision::FailOpen => "FAIL_OPEN",
            Decision::Blocked => "BLOCKED",
        }
    }

    pub fn traffic_enabled(&self) -> bool {
        !matches!(self, Decision::Blocked)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the engine is in `Blocked`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockCause {
    /// Serving cell outside the window and failed the legitimacy checks.
    NotAuthorized,
    /// Serving cell could not be read this tick.
    ServingCellUnavailable,
    /// Position unmatched or lost for longer than the configured timeout.
    PositionStale,
    /// No verified profile has been loaded.
    NoProfile,
    /// A profile is loaded but no segment has been committed yet.
    NoSegment,
    /// Engine just started and has not evaluated a tick yet.
    Boot,
}

impl BlockCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockCause::NotAuthorized => "NOT_AUTHORIZED",
            BlockCause::ServingCellUnavailable => "SERVING_CELL_UNAVAILABLE",
            BlockCause::PositionStale => "POSITION_STALE",
            BlockCause::NoProfile => "NO_PROFILE",
            BlockCause::NoSegment => "NO_SEGMENT",
            BlockCause::Boot => "BOOT",
        }
    }

    /// Only a positively rejected cell warrants deregistration and reselection;
    /// the other causes mean authorization is unknown, not refuted.
    pub fn rejects_cell(&self) -> bool {
        matches!(self, BlockCause::NotAuthorized)
    }
}

impl fmt::Display for BlockCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
