//! Collaborator interfaces the enforcer drives.
//!
//! The radio binding, the position source, the event log and the operator
//! alarm channel are all external. The enforcer only sees these traits, so
//! a bench harness, a trace replay or a real modem driver plug in the same
//! way.

use async_trait::async_trait;
use rlce_profile::AuthorizedWindow;
use rlce_schemas::{CellIdentity, EnforcementEvent, Plmn, PositionSample, ServingCellObservation};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of one ModemPort / PositionPort call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The call did not complete within the I/O timeout.
    Timeout { op: &'static str, timeout_ms: u64 },
    /// The collaborator is not reachable (device gone, link down).
    Unavailable(String),
    /// The position source is up but has no usable fix.
    NoFix,
    /// The radio rejected or failed a command.
    Command { op: &'static str, detail: String },
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortError::Timeout { op, timeout_ms } => {
                write!(f, "PORT_TIMEOUT: {op} exceeded {timeout_ms}ms")
            }
            PortError::Unavailable(d) => write!(f, "PORT_UNAVAILABLE: {d}"),
            PortError::NoFix => write!(f, "PORT_NO_FIX"),
            PortError::Command { op, detail } => write!(f, "PORT_COMMAND_FAILED: {op}: {detail}"),
        }
    }
}

impl std::error::Error for PortError {}

/// Failure to persist an event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    Io(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(d) => write!(f, "EVENT_SINK_IO: {d}"),
        }
    }
}

impl std::error::Error for SinkError {}

// ---------------------------------------------------------------------------
// Alarms
// ---------------------------------------------------------------------------

/// Operator-visible health conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HealthAlarm {
    ModemReadFailures,
    ModemCommandFailures,
    PositionUnavailable,
    /// Event records are piling up because the sink keeps failing.
    EventSinkBacklog,
    /// The event buffer overflowed and records were lost.
    EventSinkDropped,
}

impl HealthAlarm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthAlarm::ModemReadFailures => "MODEM_READ_FAILURES",
            HealthAlarm::ModemCommandFailures => "MODEM_COMMAND_FAILURES",
            HealthAlarm::PositionUnavailable => "POSITION_UNAVAILABLE",
            HealthAlarm::EventSinkBacklog => "EVENT_SINK_BACKLOG",
            HealthAlarm::EventSinkDropped => "EVENT_SINK_DROPPED",
        }
    }
}

impl fmt::Display for HealthAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Radio band restriction pushed when pinning is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BandMask {
    pub lte: BTreeSet<u32>,
    pub nr: BTreeSet<u32>,
}

/// Radio capability set.
///
/// Commands are fire-and-forget with at-least-once semantics: an `Ok` means
/// the radio accepted the command, not that it took effect. Reselection
/// outcome shows up in a later `serving_cell()`.
#[async_trait]
pub trait ModemPort: Send + Sync {
    async fn serving_cell(&self) -> Result<ServingCellObservation, PortError>;

    /// Gate PDP contexts. `false` denies new contexts and tears down
    /// existing ones.
    async fn set_traffic_enabled(&self, enabled: bool) -> Result<(), PortError>;

    async fn deregister(&self) -> Result<(), PortError>;

    async fn try_reselect(&self, window: &AuthorizedWindow) -> Result<(), PortError>;

    async fn lock_cell(&self, cell: &CellIdentity) -> Result<(), PortError>;

    async fn set_bandmask(&self, mask: &BandMask) -> Result<(), PortError>;

    async fn force_plmn(&self, plmn: &Plmn) -> Result<(), PortError>;
}

/// Latest fused position. Implementations return whatever is freshest and
/// never wait for a new fix.
#[async_trait]
pub trait PositionPort: Send + Sync {
    async fn latest(&self) -> Result<PositionSample, PortError>;
}

/// Durable, append-only destination for event records.
pub trait EventSink: Send {
    fn append(&mut self, event: &EnforcementEvent) -> Result<(), SinkError>;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn append(&mut self, event: &EnforcementEvent) -> Result<(), SinkError> {
        (**self).append(event)
    }
}

/// Operator alarm channel.
pub trait AlarmSink: Send + Sync {
    fn raise(&self, alarm: HealthAlarm, detail: &str);
    fn clear(&self, alarm: HealthAlarm);
}

/// Alarm sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlarmSink;

impl AlarmSink for TracingAlarmSink {
    fn raise(&self, alarm: HealthAlarm, detail: &str) {
        tracing::error!(alarm = %alarm, detail, "health alarm raised");
    }

    fn clear(&self, alarm: HealthAlarm) {
        tracing::info!(alarm = %alarm, "health alarm cleared");
    }
}
