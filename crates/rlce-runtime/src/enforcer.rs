use rlce_engine::{DecisionEngine, EnforcementState, RadioCommand, TickInput, TickOutcome};
use rlce_profile::ProfileStore;
use rlce_schemas::{
    BlockCause, CellIdentity, Decision, EnforcementEvent, EpochMillis, PositionSample,
    ServingCellObservation,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::health::{AlarmTransition, HealthMonitor};
use crate::{
    AlarmSink, BandMask, BufferedSink, EventSink, HealthAlarm, ModemPort, PortError,
    PositionPort, RuntimeSettings, StateStore,
};

/// A radio command that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub command: &'static str,
    pub error: PortError,
}

/// What one tick did, for status display and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick_ms: EpochMillis,
    pub decision: Decision,
    pub block_cause: Option<BlockCause>,
    pub segment_index: Option<usize>,
    pub serving_cell: Option<CellIdentity>,
    pub position_error: Option<PortError>,
    pub serving_cell_error: Option<PortError>,
    /// Commands attempted, in order.
    pub commands: Vec<&'static str>,
    pub command_failures: Vec<CommandFailure>,
    pub events_emitted: usize,
    pub events_written: usize,
    pub events_pending: usize,
    pub recovered_after_ms: Option<i64>,
    pub state_persisted: bool,
}

/// Drives one [`DecisionEngine`] against its collaborators.
///
/// Owns the engine exclusively; `tick` takes `&mut self`, so two ticks can
/// never overlap.
pub struct Enforcer {
    engine: DecisionEngine,
    profiles: Arc<ProfileStore>,
    modem: Arc<dyn ModemPort>,
    position: Arc<dyn PositionPort>,
    sink: BufferedSink<Box<dyn EventSink>>,
    alarms: Arc<dyn AlarmSink>,
    store: Option<StateStore>,
    health: HealthMonitor,
    io_timeout: Duration,
    /// Traffic state at the radio matches what the engine believes.
    fenced: bool,
    reports: watch::Sender<Option<TickReport>>,
}

impl Enforcer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: DecisionEngine,
        profiles: Arc<ProfileStore>,
        modem: Arc<dyn ModemPort>,
        position: Arc<dyn PositionPort>,
        sink: Box<dyn EventSink>,
        alarms: Arc<dyn AlarmSink>,
        store: Option<StateStore>,
        settings: &RuntimeSettings,
    ) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            engine,
            profiles,
            modem,
            position,
            sink: BufferedSink::new(sink, settings.event_buffer_capacity),
            alarms,
            store,
            health: HealthMonitor::new(settings.retry_budget),
            io_timeout: settings.io_timeout,
            fenced: false,
            reports,
        }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn state(&self) -> &EnforcementState {
        self.engine.state()
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn pending_events(&self) -> usize {
        self.sink.pending()
    }

    /// Receives the report of every completed tick.
    pub fn subscribe(&self) -> watch::Receiver<Option<TickReport>> {
        self.reports.subscribe()
    }

    /// Force traffic off before anything else. The engine boots believing
    /// traffic is disabled; this makes it true at the radio. Retried on
    /// every tick until it succeeds, and again after any traffic command
    /// fails (the radio's traffic state is then unknown).
    pub async fn fence(&mut self) -> Result<(), PortError> {
        let modem = Arc::clone(&self.modem);
        let r = bounded(self.io_timeout, "set_traffic_enabled", async move {
            modem.set_traffic_enabled(false).await
        })
        .await;
        match &r {
            Ok(()) => {
                info!("traffic fenced off");
                self.fenced = true;
                self.engine.note_traffic_disabled();
                self.note(HealthAlarm::ModemCommandFailures, None);
            }
            Err(e) => {
                error!(error = %e, "boot fence failed; traffic state at the radio unknown");
                self.note(HealthAlarm::ModemCommandFailures, Some(e));
            }
        }
        r
    }

    /// One full evaluation at `now_ms`.
    pub async fn tick(&mut self, now_ms: EpochMillis) -> TickReport {
        if !self.fenced {
            let _ = self.fence().await;
        }

        // One profile snapshot for the whole tick.
        let profile = self.profiles.current();

        let modem = Arc::clone(&self.modem);
        let position = Arc::clone(&self.position);
        let (cell_r, pos_r) = tokio::join!(
            bounded(self.io_timeout, "serving_cell", async move {
                modem.serving_cell().await
            }),
            bounded(self.io_timeout, "position", async move {
                position.latest().await
            }),
        );

        self.note(HealthAlarm::ModemReadFailures, cell_r.as_ref().err());
        self.note(HealthAlarm::PositionUnavailable, pos_r.as_ref().err());
        if let Err(e) = &cell_r {
            debug!(error = %e, "serving cell read failed");
        }
        if let Err(e) = &pos_r {
            debug!(error = %e, "position read failed");
        }

        let serving: Option<ServingCellObservation> = cell_r.as_ref().ok().cloned();
        let sample: Option<PositionSample> = pos_r.as_ref().ok().copied();

        let outcome = self.engine.tick(TickInput {
            now_ms,
            profile: profile.as_deref(),
            position: sample.as_ref(),
            serving_cell: serving.as_ref(),
        });
        log_outcome(&outcome);

        let command_failures = self.execute(&outcome.commands).await;

        let events_emitted = outcome.events.len();
        for ev in &outcome.events {
            self.sink.push(ev.clone());
        }
        let flush = self.sink.flush();
        self.note_flush(&flush);

        let mut state_persisted = false;
        if outcome.state_changed {
            if let Some(store) = &self.store {
                match store.save(self.engine.state(), outcome.tick_ms) {
                    Ok(()) => state_persisted = true,
                    Err(e) => warn!(error = %format!("{e:#}"), "state persist failed"),
                }
            }
        }

        let report = TickReport {
            tick_ms: outcome.tick_ms,
            decision: outcome.decision,
            block_cause: outcome.block_cause,
            segment_index: outcome.segment.and_then(|u| u.committed),
            serving_cell: serving.as_ref().map(|s| s.identity()),
            position_error: pos_r.err(),
            serving_cell_error: cell_r.err(),
            commands: outcome.commands.iter().map(RadioCommand::name).collect(),
            command_failures,
            events_emitted,
            events_written: flush.written,
            events_pending: flush.pending,
            recovered_after_ms: outcome.recovered_after_ms,
            state_persisted,
        };
        self.reports.send_replace(Some(report.clone()));
        report
    }

    /// Final flush and persist. Called once the loop has stopped ticking.
    pub async fn shutdown(&mut self, now_ms: EpochMillis) {
        let flush = self.sink.flush();
        if flush.pending > 0 {
            warn!(
                pending = flush.pending,
                "event records still unwritten at shutdown"
            );
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.save(self.engine.state(), now_ms) {
                warn!(error = %format!("{e:#}"), "final state persist failed");
            }
        }
        info!(
            decision = %self.engine.decision(),
            written = flush.written,
            "enforcer stopped"
        );
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Run every command in order. A failure is recorded and the rest still
    /// run: a failed deregister must not stop the reselect.
    async fn execute(&mut self, commands: &[RadioCommand]) -> Vec<CommandFailure> {
        let mut failures = Vec::new();
        for cmd in commands {
            let modem = Arc::clone(&self.modem);
            let name = cmd.name();
            let r = match cmd.clone() {
                RadioCommand::EnableTraffic => {
                    bounded(self.io_timeout, name, async move {
                        modem.set_traffic_enabled(true).await
                    })
                    .await
                }
                RadioCommand::DisableTraffic => {
                    bounded(self.io_timeout, name, async move {
                        modem.set_traffic_enabled(false).await
                    })
                    .await
                }
                RadioCommand::Deregister => {
                    bounded(self.io_timeout, name, async move { modem.deregister().await }).await
                }
                RadioCommand::TryReselect { window } => {
                    bounded(self.io_timeout, name, async move {
                        modem.try_reselect(&window).await
                    })
                    .await
                }
                RadioCommand::LockCell { cell } => {
                    bounded(self.io_timeout, name, async move {
                        modem.lock_cell(&cell).await
                    })
                    .await
                }
                RadioCommand::SetBandmask { lte, nr } => {
                    let mask = BandMask { lte, nr };
                    bounded(self.io_timeout, name, async move {
                        modem.set_bandmask(&mask).await
                    })
                    .await
                }
                RadioCommand::ForcePlmn { plmn } => {
                    bounded(self.io_timeout, name, async move {
                        modem.force_plmn(&plmn).await
                    })
                    .await
                }
            };
            match r {
                Ok(()) => {
                    debug!(command = name, "radio command accepted");
                    self.note(HealthAlarm::ModemCommandFailures, None);
                }
                Err(e) => {
                    warn!(command = name, error = %e, "radio command failed");
                    if matches!(
                        cmd,
                        RadioCommand::EnableTraffic | RadioCommand::DisableTraffic
                    ) {
                        self.fenced = false;
                    }
                    self.note(HealthAlarm::ModemCommandFailures, Some(&e));
                    failures.push(CommandFailure {
                        command: name,
                        error: e,
                    });
                }
            }
        }
        failures
    }

    fn note(&mut self, alarm: HealthAlarm, err: Option<&PortError>) {
        let t = match err {
            None => self.health.success(alarm),
            Some(_) => self.health.failure(alarm),
        };
        let detail = err.map(|e| e.to_string()).unwrap_or_default();
        self.publish(t, &detail);
    }

    fn note_flush(&mut self, flush: &crate::FlushOutcome) {
        if flush.dropped > 0 {
            let t = self.health.raise_now(HealthAlarm::EventSinkDropped);
            self.publish(t, &format!("{} event records dropped", flush.dropped));
        } else if flush.pending == 0 {
            let t = self.health.success(HealthAlarm::EventSinkDropped);
            self.publish(t, "");
        }

        let t = match &flush.error {
            Some(e) => {
                warn!(error = %e, pending = flush.pending, "event sink write failed");
                self.health.failure(HealthAlarm::EventSinkBacklog)
            }
            None => self.health.success(HealthAlarm::EventSinkBacklog),
        };
        let detail = flush
            .error
            .as_ref()
            .map(|e| format!("{e}; {} pending", flush.pending))
            .unwrap_or_default();
        self.publish(t, &detail);
    }

    fn publish(&self, t: Option<AlarmTransition>, detail: &str) {
        match t {
            Some(AlarmTransition::Raised(a)) => self.alarms.raise(a, detail),
            Some(AlarmTransition::Cleared(a)) => self.alarms.clear(a),
            None => {}
        }
    }
}

/// Run `fut` under the I/O timeout. Expiry is a [`PortError::Timeout`].
async fn bounded<T, F>(limit: Duration, op: &'static str, fut: F) -> Result<T, PortError>
where
    F: Future<Output = Result<T, PortError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(r) => r,
        Err(_) => Err(PortError::Timeout {
            op,
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

fn log_outcome(o: &TickOutcome) {
    if let Some(ms) = o.recovered_after_ms {
        info!(decision = %o.decision, downtime_ms = ms, "traffic restored");
    }
    if !o.transitioned() && o.events.is_empty() {
        return;
    }
    for ev in &o.events {
        match ev {
            EnforcementEvent::FailOpen(e) => warn!(
                segment = e.segment_index,
                cell = %e.observed_cell.identity(),
                "fail-open on unlisted cell"
            ),
            EnforcementEvent::Block(e) => warn!(
                cause = %e.cause,
                segment = ?e.segment_index,
                failed = ?e.per_check_detail.map(|c| c.failed()),
                "traffic blocked"
            ),
        }
    }
    if o.transitioned() {
        info!(
            from = %o.previous_decision,
            to = %o.decision,
            tick_ms = o.tick_ms,
            "decision changed"
        );
    }
}
