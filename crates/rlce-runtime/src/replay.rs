//! Recorded drive traces: one JSON object per line, offsets relative to the
//! start of the recording.
//!
//! ```text
//! {"t_ms":0,"position":{"timestamp_ms":0,"coord":{"kind":"chainage","m":120.0}},"serving_cell":{...}}
//! {"t_ms":250,"position":null,"serving_cell":null}
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rlce_profile::AuthorizedWindow;
use rlce_schemas::{CellIdentity, Plmn, PositionSample, ServingCellObservation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::{BandMask, Clock, ModemPort, PortError, PositionPort};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub t_ms: i64,
    #[serde(default)]
    pub position: Option<PositionSample>,
    #[serde(default)]
    pub serving_cell: Option<ServingCellObservation>,
}

pub fn parse_trace_jsonl(raw: &str) -> Result<Vec<TraceRecord>> {
    let mut out: Vec<TraceRecord> = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let rec: TraceRecord = serde_json::from_str(line)
            .with_context(|| format!("TRACE_INVALID: line {}", i + 1))?;
        if let Some(prev) = out.last() {
            if rec.t_ms < prev.t_ms {
                bail!(
                    "TRACE_INVALID: line {} goes back in time ({} < {})",
                    i + 1,
                    rec.t_ms,
                    prev.t_ms
                );
            }
        }
        out.push(rec);
    }
    Ok(out)
}

pub fn load_trace_jsonl(path: impl AsRef<Path>) -> Result<Vec<TraceRecord>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("read trace {:?}", path))?;
    parse_trace_jsonl(&raw)
}

/// Plays a trace back against the clock, for bench runs of the daemon.
///
/// Reads return the latest record at or before `now - start`; the last
/// record holds once the trace is exhausted. Radio commands are logged and
/// accepted but change nothing.
#[derive(Clone)]
pub struct TraceReplay {
    records: Arc<Vec<TraceRecord>>,
    clock: Arc<dyn Clock>,
    start_ms: i64,
}

impl TraceReplay {
    pub fn new(records: Vec<TraceRecord>, clock: Arc<dyn Clock>) -> Self {
        let start_ms = clock.now_ms();
        Self {
            records: Arc::new(records),
            clock,
            start_ms,
        }
    }

    fn current(&self) -> Option<&TraceRecord> {
        let offset = self.clock.now_ms() - self.start_ms;
        let n = self.records.partition_point(|r| r.t_ms <= offset);
        n.checked_sub(1).and_then(|i| self.records.get(i))
    }
}

#[async_trait]
impl ModemPort for TraceReplay {
    async fn serving_cell(&self) -> Result<ServingCellObservation, PortError> {
        self.current()
            .and_then(|r| r.serving_cell.clone())
            .ok_or_else(|| PortError::Unavailable("no serving cell in trace".to_string()))
    }

    async fn set_traffic_enabled(&self, enabled: bool) -> Result<(), PortError> {
        info!(enabled, "trace radio: set_traffic_enabled");
        Ok(())
    }

    async fn deregister(&self) -> Result<(), PortError> {
        info!("trace radio: deregister");
        Ok(())
    }

    async fn try_reselect(&self, window: &AuthorizedWindow) -> Result<(), PortError> {
        info!(
            segment = window.segment_index(),
            cells = window.len(),
            "trace radio: try_reselect"
        );
        Ok(())
    }

    async fn lock_cell(&self, cell: &CellIdentity) -> Result<(), PortError> {
        info!(cell = %cell, "trace radio: lock_cell");
        Ok(())
    }

    async fn set_bandmask(&self, mask: &BandMask) -> Result<(), PortError> {
        info!(lte = ?mask.lte, nr = ?mask.nr, "trace radio: set_bandmask");
        Ok(())
    }

    async fn force_plmn(&self, plmn: &Plmn) -> Result<(), PortError> {
        info!(plmn = %plmn, "trace radio: force_plmn");
        Ok(())
    }
}

#[async_trait]
impl PositionPort for TraceReplay {
    async fn latest(&self) -> Result<PositionSample, PortError> {
        let offset = self.clock.now_ms() - self.start_ms;
        match self.current().and_then(|r| r.position) {
            // Re-stamp onto the live clock, keeping the sample's age.
            Some(p) => Ok(PositionSample {
                timestamp_ms: self.start_ms + p.timestamp_ms.min(offset),
                coord: p.coord,
            }),
            None => Err(PortError::NoFix),
        }
    }
}
