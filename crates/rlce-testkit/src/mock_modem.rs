//! In-memory radio with a known reselection latency.

use async_trait::async_trait;
use rlce_profile::AuthorizedWindow;
use rlce_runtime::{BandMask, ModemPort, PortError};
use rlce_schemas::{CellIdentity, Plmn, ServingCellObservation};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::fixtures::observe;

/// One call the enforcer made, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ModemCall {
    ServingCell,
    SetTraffic(bool),
    Deregister,
    /// Segment the reselect window was built for.
    TryReselect { window_segment: usize },
    LockCell(CellIdentity),
    SetBandmask(BandMask),
    ForcePlmn(Plmn),
}

#[derive(Debug)]
struct Inner {
    serving: Option<ServingCellObservation>,
    pending: Option<(Instant, ServingCellObservation)>,
    t_reselect: Duration,
    traffic_enabled: Option<bool>,
    calls: Vec<ModemCall>,
    fail_reads: bool,
    fail_commands: bool,
    read_delay: Option<Duration>,
}

/// Cloneable handle; all clones share one radio.
///
/// `try_reselect` moves the radio onto the strongest window cell on the same
/// RAT after `t_reselect` (tokio time), or immediately if it is zero.
#[derive(Debug, Clone)]
pub struct MockModem {
    inner: Arc<Mutex<Inner>>,
}

impl MockModem {
    pub fn new(t_reselect: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                serving: None,
                pending: None,
                t_reselect,
                traffic_enabled: None,
                calls: Vec::new(),
                fail_reads: false,
                fail_commands: false,
                read_delay: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Camp on `cell` now, cancelling any pending reselection.
    pub fn set_serving(&self, cell: Option<ServingCellObservation>) {
        let mut g = self.lock();
        g.serving = cell;
        g.pending = None;
    }

    pub fn serving(&self) -> Option<ServingCellObservation> {
        self.lock().serving.clone()
    }

    pub fn traffic_enabled(&self) -> Option<bool> {
        self.lock().traffic_enabled
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn set_fail_commands(&self, fail: bool) {
        self.lock().fail_commands = fail;
    }

    /// Make `serving_cell()` take this long before answering.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.lock().read_delay = delay;
    }

    pub fn calls(&self) -> Vec<ModemCall> {
        self.lock().calls.clone()
    }

    /// Commands only, without the serving-cell reads.
    pub fn commands(&self) -> Vec<ModemCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| **c != ModemCall::ServingCell)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn command(&self, call: ModemCall) -> Result<(), PortError> {
        let mut g = self.lock();
        let op = match &call {
            ModemCall::SetTraffic(_) => "set_traffic_enabled",
            ModemCall::Deregister => "deregister",
            ModemCall::TryReselect { .. } => "try_reselect",
            ModemCall::LockCell(_) => "lock_cell",
            ModemCall::SetBandmask(_) => "set_bandmask",
            ModemCall::ForcePlmn(_) => "force_plmn",
            ModemCall::ServingCell => "serving_cell",
        };
        g.calls.push(call.clone());
        if g.fail_commands {
            return Err(PortError::Command {
                op,
                detail: "injected failure".to_string(),
            });
        }
        if let ModemCall::SetTraffic(on) = call {
            g.traffic_enabled = Some(on);
        }
        Ok(())
    }
}

#[async_trait]
impl ModemPort for MockModem {
    async fn serving_cell(&self) -> Result<ServingCellObservation, PortError> {
        let delay = {
            let mut g = self.lock();
            g.calls.push(ModemCall::ServingCell);
            g.read_delay
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let mut g = self.lock();
        if g.fail_reads {
            return Err(PortError::Unavailable("injected read failure".to_string()));
        }
        let due = g.pending.as_ref().map(|(at, _)| *at);
        if due.is_some_and(|at| Instant::now() >= at) {
            g.serving = g.pending.take().map(|(_, cell)| cell);
        }
        g.serving
            .clone()
            .ok_or_else(|| PortError::Unavailable("no cell".to_string()))
    }

    async fn set_traffic_enabled(&self, enabled: bool) -> Result<(), PortError> {
        self.command(ModemCall::SetTraffic(enabled))
    }

    async fn deregister(&self) -> Result<(), PortError> {
        self.command(ModemCall::Deregister)
    }

    async fn try_reselect(&self, window: &AuthorizedWindow) -> Result<(), PortError> {
        self.command(ModemCall::TryReselect {
            window_segment: window.segment_index(),
        })?;
        let mut g = self.lock();
        let rat = g.serving.as_ref().map(|s| s.rat);
        let target = rat
            .and_then(|r| window.strongest_on(r))
            .or_else(|| window.entries().next());
        if let Some(entry) = target {
            let cell = observe(&entry.cal);
            let latency = g.t_reselect;
            if latency.is_zero() {
                g.serving = Some(cell);
                g.pending = None;
            } else {
                g.pending = Some((Instant::now() + latency, cell));
            }
        }
        Ok(())
    }

    async fn lock_cell(&self, cell: &CellIdentity) -> Result<(), PortError> {
        self.command(ModemCall::LockCell(cell.clone()))
    }

    async fn set_bandmask(&self, mask: &BandMask) -> Result<(), PortError> {
        self.command(ModemCall::SetBandmask(mask.clone()))
    }

    async fn force_plmn(&self, plmn: &Plmn) -> Result<(), PortError> {
        self.command(ModemCall::ForcePlmn(plmn.clone()))
    }
}
