//! rlce-runtime
//!
//! Async shell around the pure decision engine.
//!
//! - Collaborators are traits ([`ModemPort`], [`PositionPort`], [`EventSink`],
//!   [`AlarmSink`]); every port call is bounded by the I/O timeout and a
//!   timeout counts as a failed read.
//! - [`Enforcer::tick`] reads, decides, commands the radio, writes the
//!   event records and persists state, in that order.
//! - [`run`] drives ticks at a fixed cadence and shuts down between ticks.
//! - Event-log trouble never holds back a traffic decision: records are
//!   buffered and retried, and a sustained outage raises an alarm.

mod clock;
mod driver;
mod enforcer;
mod health;
mod ports;
mod position;
mod replay;
mod settings;
mod sink;
mod state_store;

pub use clock::{Clock, SystemClock, TokioClock};
pub use driver::{run, RunSummary};
pub use enforcer::{CommandFailure, Enforcer, TickReport};
pub use health::{AlarmTransition, HealthMonitor};
pub use ports::*;
pub use position::{spawn_position_producer, LatestPosition, PositionPublisher};
pub use replay::{load_trace_jsonl, parse_trace_jsonl, TraceRecord, TraceReplay};
pub use settings::{engine_params, legitimacy_params, RuntimeSettings};
pub use sink::{
    AuditEventSink, BufferedSink, FlushOutcome, SessionHeader, UnavailableSink, LOG_RECOVERED_KIND,
    SESSION_START_KIND,
};
pub use state_store::{PersistedState, StateStore};
