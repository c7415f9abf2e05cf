//! Event sinks: the hash-chained audit log, a stand-in for when no log can
//! be opened, and the retry buffer in front of any sink.

use anyhow::{Context, Result};
use rlce_audit::AuditWriter;
use rlce_schemas::EnforcementEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

use crate::{EventSink, SinkError};

/// Kind of the first record every session writes.
pub const SESSION_START_KIND: &str = "SESSION_START";

/// Written after the session header when a damaged tail was cut on open.
pub const LOG_RECOVERED_KIND: &str = "LOG_RECOVERED";

/// Identifies the process run that produced the records that follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub vehicle_id: String,
    pub config_hash: String,
    pub profile_epoch: Option<u64>,
    pub started_at_ms: i64,
}

// ---------------------------------------------------------------------------
// AuditEventSink
// ---------------------------------------------------------------------------

/// [`EventSink`] over the append-only audit log.
pub struct AuditEventSink {
    writer: AuditWriter,
}

impl AuditEventSink {
    /// Open the log at `path`, resume its chain and write a session header.
    ///
    /// If the previous run left a torn final line, the session header is
    /// followed by a `LOG_RECOVERED` record naming what was cut.
    pub fn open(path: impl AsRef<Path>, header: &SessionHeader) -> Result<Self> {
        let mut writer = AuditWriter::open(path, Uuid::new_v4())?;
        let payload = serde_json::to_value(header).context("encode session header")?;
        writer
            .append(SESSION_START_KIND, payload)
            .context("write session header")?;

        if let Some(repair) = writer.repaired().cloned() {
            warn!(
                path = %writer.path().display(),
                line = repair.line,
                dropped_bytes = repair.dropped_bytes,
                reason = %repair.reason,
                "event log tail was damaged and has been cut"
            );
            writer
                .append(
                    LOG_RECOVERED_KIND,
                    serde_json::json!({
                        "line": repair.line,
                        "dropped_bytes": repair.dropped_bytes,
                        "reason": repair.reason,
                    }),
                )
                .context("write recovery record")?;
        }
        Ok(Self { writer })
    }

    pub fn session_id(&self) -> Uuid {
        self.writer.session_id()
    }

    /// Records in the log, including earlier sessions.
    pub fn len(&self) -> u64 {
        self.writer.seq()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.seq() == 0
    }
}

impl EventSink for AuditEventSink {
    fn append(&mut self, event: &EnforcementEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_value(event).map_err(|e| SinkError::Io(e.to_string()))?;
        self.writer
            .append(event.kind(), payload)
            .map(|_| ())
            .map_err(|e| SinkError::Io(format!("{e:#}")))
    }
}

// ---------------------------------------------------------------------------
// UnavailableSink
// ---------------------------------------------------------------------------

/// Refuses every record. Stands in when no event log could be opened, so
/// the loop still runs fenced and the backlog alarm reports the outage.
#[derive(Debug, Clone)]
pub struct UnavailableSink {
    reason: String,
}

impl UnavailableSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl EventSink for UnavailableSink {
    fn append(&mut self, _event: &EnforcementEvent) -> Result<(), SinkError> {
        Err(SinkError::Io(format!("event log unavailable: {}", self.reason)))
    }
}

// ---------------------------------------------------------------------------
// BufferedSink
// ---------------------------------------------------------------------------

/// Result of one flush attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushOutcome {
    pub written: usize,
    /// Still waiting after this flush.
    pub pending: usize,
    /// Discarded by overflow since the previous flush.
    pub dropped: u64,
    pub error: Option<SinkError>,
}

/// Bounded FIFO in front of an [`EventSink`].
///
/// Records are written in order; the first failure stops the flush and the
/// rest wait for the next one. When full, the oldest pending record is
/// discarded so the decision loop never blocks on the log.
pub struct BufferedSink<S> {
    inner: S,
    pending: VecDeque<EnforcementEvent>,
    capacity: usize,
    dropped_since_flush: u64,
    dropped_total: u64,
}

impl<S: EventSink> BufferedSink<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            capacity: capacity.max(1),
            dropped_since_flush: 0,
            dropped_total: 0,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    pub fn push(&mut self, event: EnforcementEvent) {
        if self.pending.len() >= self.capacity {
            self.pending.pop_front();
            self.dropped_since_flush += 1;
            self.dropped_total += 1;
        }
        self.pending.push_back(event);
    }

    pub fn flush(&mut self) -> FlushOutcome {
        let mut out = FlushOutcome {
            dropped: std::mem::take(&mut self.dropped_since_flush),
            ..FlushOutcome::default()
        };
        while let Some(ev) = self.pending.front() {
            match self.inner.append(ev) {
                Ok(()) => {
                    self.pending.pop_front();
                    out.written += 1;
                }
                Err(e) => {
                    out.error = Some(e);
                    break;
                }
            }
        }
        out.pending = self.pending.len();
        out
    }
}
