use rlce_legitimacy::LegitimacyResult;
use rlce_profile::AuthorizedWindow;
use rlce_schemas::{
    BlockCause, CellIdentity, Decision, EnforcementEvent, EpochMillis, Plmn, PositionSample,
    RouteProfile, ServingCellObservation,
};
use rlce_segment::{SegmentParams, SegmentUpdate};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Default length of the recent-tick history.
pub const DEFAULT_HISTORY_LEN: usize = 8;

/// Engine tuning, mapped from the enforcement config by the runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineParams {
    /// Grace window g.
    pub grace: usize,
    pub segment: SegmentParams,
    /// Re-issue deregister + reselect at this cadence while blocked on the
    /// same rejected cell. `None` issues them once per rejected cell/window.
    pub reselect_retry_ms: Option<i64>,
    /// On a reselect retry, also lock onto the strongest window cell.
    pub lock_cell_escalation: bool,
    /// Push band mask (and PLMN when unambiguous) on every window change.
    pub radio_pinning: bool,
    pub history_len: usize,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            grace: 1,
            segment: SegmentParams::default(),
            reselect_retry_ms: Some(2_000),
            lock_cell_escalation: false,
            radio_pinning: false,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

/// Everything the engine sees on one tick. `None` means the read failed or
/// timed out.
#[derive(Clone, Copy, Debug)]
pub struct TickInput<'a> {
    pub now_ms: EpochMillis,
    pub profile: Option<&'a RouteProfile>,
    pub position: Option<&'a PositionSample>,
    pub serving_cell: Option<&'a ServingCellObservation>,
}

/// Side effect requested from the radio, in execution order.
#[derive(Clone, Debug, PartialEq)]
pub enum RadioCommand {
    /// Allow PDP contexts again.
    EnableTraffic,
    /// Deny new PDP contexts and tear down existing ones.
    DisableTraffic,
    Deregister,
    TryReselect { window: Arc<AuthorizedWindow> },
    LockCell { cell: CellIdentity },
    SetBandmask {
        lte: BTreeSet<u32>,
        nr: BTreeSet<u32>,
    },
    ForcePlmn { plmn: Plmn },
}

impl RadioCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RadioCommand::EnableTraffic => "ENABLE_TRAFFIC",
            RadioCommand::DisableTraffic => "DISABLE_TRAFFIC",
            RadioCommand::Deregister => "DEREGISTER",
            RadioCommand::TryReselect { .. } => "TRY_RESELECT",
            RadioCommand::LockCell { .. } => "LOCK_CELL",
            RadioCommand::SetBandmask { .. } => "SET_BANDMASK",
            RadioCommand::ForcePlmn { .. } => "FORCE_PLMN",
        }
    }
}

/// Result of one tick.
#[derive(Clone, Debug)]
pub struct TickOutcome {
    /// Tick time after clamping to the last processed tick.
    pub tick_ms: EpochMillis,
    pub previous_decision: Decision,
    pub decision: Decision,
    pub block_cause: Option<BlockCause>,
    /// `None` when no profile was available to index against.
    pub segment: Option<SegmentUpdate>,
    pub window: Option<Arc<AuthorizedWindow>>,
    /// Whether the serving cell was in the window, when that was decidable.
    pub in_window: Option<bool>,
    /// Only set when the cell was outside the window.
    pub legitimacy: Option<LegitimacyResult>,
    pub commands: Vec<RadioCommand>,
    pub events: Vec<EnforcementEvent>,
    /// Time spent blocked, reported on the tick that leaves BLOCKED.
    pub recovered_after_ms: Option<i64>,
    /// The persistable state differs from before the tick.
    pub state_changed: bool,
}

impl TickOutcome {
    pub fn transitioned(&self) -> bool {
        self.decision != self.previous_decision
    }
}

/// Compact record kept in the recent-tick history.
#[derive(Clone, Debug, PartialEq)]
pub struct TickSummary {
    pub tick_ms: EpochMillis,
    pub decision: Decision,
    pub block_cause: Option<BlockCause>,
    pub segment_index: Option<usize>,
    pub serving_cell: Option<CellIdentity>,
    pub commands: Vec<&'static str>,
}
