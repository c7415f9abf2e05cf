//! Boot sequence: config, profile, persisted state, event log, enforcer.
//!
//! Config and profile either load or stop the daemon with a coded error.
//! Past that point the radio is fenced first and nothing else stops the
//! boot: an unreadable state file means booting fresh, and an event log
//! that cannot be resumed is set aside (or replaced by an alarmed stand-in)
//! so the loop still runs blocked.

use anyhow::{Context, Result};
use rlce_config::{
    load_layered_yaml, report_unused_keys, ConfigMode, EnforcementConfig, LoadedConfig,
    UnusedKeyPolicy,
};
use rlce_engine::{DecisionEngine, EnforcementState};
use rlce_legitimacy::LegitimacyEvaluator;
use rlce_profile::{load_profile_json, ProfileStore};
use rlce_runtime::{
    engine_params, legitimacy_params, load_trace_jsonl, spawn_position_producer, AlarmSink,
    AuditEventSink, Clock, Enforcer, EventSink, HealthAlarm, LatestPosition, ModemPort,
    PositionPort, RuntimeSettings, SessionHeader, StateStore, TraceReplay, UnavailableSink,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Merged config plus its typed view.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub loaded: LoadedConfig,
    pub enforcement: EnforcementConfig,
}

/// Load, hash and validate the YAML layers. Unused keys are warnings here.
pub fn load_config(paths: &[String]) -> Result<DaemonConfig> {
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&refs).context("CONFIG_INVALID: load failed")?;

    let report = report_unused_keys(
        ConfigMode::Enforce,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    for key in &report.unused_leaf_pointers {
        warn!(key = %key, "unused config key");
    }

    let enforcement = loaded.enforcement()?;
    info!(
        config_hash = %loaded.config_hash,
        layers = paths.len(),
        vehicle_id = %enforcement.vehicle.vehicle_id,
        "config loaded"
    );
    Ok(DaemonConfig {
        loaded,
        enforcement,
    })
}

/// Decode, validate and install the route profile.
pub fn load_profile(store: &ProfileStore, path: &str) -> Result<()> {
    let profile = load_profile_json(path).with_context(|| format!("profile {path}"))?;
    let installed = store
        .load(profile)
        .with_context(|| format!("profile {path} rejected"))?;
    info!(
        route_id = %installed.route_id,
        epoch = installed.epoch,
        segments = installed.segments.len(),
        "route profile loaded"
    );
    Ok(())
}

/// Re-read the profile at `path` into a running store. Returns whether it
/// was installed; on rejection the profile already in force stays.
pub fn reload_profile(store: &ProfileStore, path: &str) -> bool {
    match load_profile(store, path) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                error = %format!("{e:#}"),
                epoch = ?store.epoch(),
                "profile reload refused; keeping the installed profile"
            );
            false
        }
    }
}

/// Reload the profile on every SIGHUP until shutdown.
#[cfg(unix)]
pub fn spawn_profile_reloader(
    store: Arc<ProfileStore>,
    path: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("install SIGHUP handler")?;
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                got = hangup.recv() => {
                    if got.is_none() {
                        break;
                    }
                    info!(path = %path, "SIGHUP: reloading route profile");
                    reload_profile(&store, &path);
                }
                _ = shutdown.changed() => break,
            }
        }
    }))
}

/// Persisted engine state, or `None` to boot fresh.
pub fn load_persisted(store: &StateStore) -> Option<EnforcementState> {
    match store.load() {
        Ok(Some(p)) => {
            info!(
                saved_at_ms = p.saved_at_ms,
                committed_segment = ?p.state.committed_segment,
                downtime_open = p.state.downtime_started_ms.is_some(),
                "persisted state restored"
            );
            Some(p.state)
        }
        Ok(None) => {
            info!(path = %store.path().display(), "no persisted state; booting fresh");
            None
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "persisted state unusable; booting fresh");
            None
        }
    }
}

/// Radio and position collaborators for one run.
pub struct Radio {
    pub modem: Arc<dyn ModemPort>,
    pub position: Arc<dyn PositionPort>,
    /// Background position poller, if the binding needs one.
    pub producer: Option<JoinHandle<()>>,
}

/// Bench binding: replay a recorded trace. Position is sampled by its own
/// task so the tick only ever reads the latest fix.
pub fn trace_radio(
    path: &str,
    clock: Arc<dyn Clock>,
    settings: &RuntimeSettings,
    shutdown: watch::Receiver<bool>,
) -> Result<Radio> {
    let records = load_trace_jsonl(path).with_context(|| format!("trace {path}"))?;
    info!(path, records = records.len(), "trace radio binding");
    let replay = Arc::new(TraceReplay::new(records, clock));

    let (publisher, latest) = LatestPosition::channel();
    let source: Arc<dyn PositionPort> = replay.clone();
    let producer = spawn_position_producer(source, publisher, settings.tick_interval, shutdown);

    Ok(Radio {
        modem: replay,
        position: Arc::new(latest),
        producer: Some(producer),
    })
}

/// Turn traffic off at the radio before anything else can fail.
/// Returns whether the modem confirmed; the enforcer retries on every tick
/// until it does.
pub async fn fence_radio(radio: &Radio, io_timeout: Duration) -> bool {
    match tokio::time::timeout(io_timeout, radio.modem.set_traffic_enabled(false)).await {
        Ok(Ok(())) => {
            info!("traffic fenced off before boot");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "early fence failed; retried on every tick");
            false
        }
        Err(_) => {
            warn!(timeout_ms = io_timeout.as_millis() as u64, "early fence timed out");
            false
        }
    }
}

/// Open the event log for this session.
///
/// A log that cannot be resumed is renamed to `<path>.broken.<now_ms>` and
/// a fresh one started. If no log can be opened at all, records go to an
/// [`UnavailableSink`] and the backlog alarm is raised.
pub fn open_event_sink(
    path: &str,
    header: &SessionHeader,
    alarms: &dyn AlarmSink,
    now_ms: i64,
) -> Box<dyn EventSink> {
    let first = match AuditEventSink::open(path, header) {
        Ok(sink) => return opened(path, sink),
        Err(e) => format!("{e:#}"),
    };
    warn!(path, error = %first, "event log cannot be resumed");

    if Path::new(path).exists() {
        let aside = format!("{path}.broken.{now_ms}");
        match std::fs::rename(path, &aside) {
            Ok(()) => {
                warn!(path, moved_to = %aside, "damaged event log set aside");
                match AuditEventSink::open(path, header) {
                    Ok(sink) => return opened(path, sink),
                    Err(e) => warn!(path, error = %format!("{e:#}"), "fresh event log failed"),
                }
            }
            Err(e) => warn!(path, error = %e, "could not set damaged event log aside"),
        }
    }

    let detail = format!("event log {path} unavailable: {first}");
    alarms.raise(HealthAlarm::EventSinkBacklog, &detail);
    Box::new(UnavailableSink::new(detail))
}

fn opened(path: &str, sink: AuditEventSink) -> Box<dyn EventSink> {
    info!(
        path,
        session_id = %sink.session_id(),
        records = sink.len(),
        "event log opened"
    );
    Box::new(sink)
}

/// Build the enforcer: restore state, open the event log with a session
/// header, and hand everything to the runtime.
pub fn assemble(
    cfg: &DaemonConfig,
    profiles: Arc<ProfileStore>,
    radio: &Radio,
    alarms: Arc<dyn AlarmSink>,
    now_ms: i64,
) -> Result<Enforcer> {
    let e = &cfg.enforcement;
    let settings = RuntimeSettings::from_config(e);

    let store = StateStore::new(&e.storage.state_path);
    let persisted = load_persisted(&store);

    let header = SessionHeader {
        vehicle_id: e.vehicle.vehicle_id.clone(),
        config_hash: cfg.loaded.config_hash.clone(),
        profile_epoch: profiles.epoch(),
        started_at_ms: now_ms,
    };
    let sink = open_event_sink(&e.storage.audit_path, &header, alarms.as_ref(), now_ms);

    let engine = DecisionEngine::new(
        engine_params(e),
        LegitimacyEvaluator::new(legitimacy_params(e)),
        persisted,
    );
    Ok(Enforcer::new(
        engine,
        profiles,
        Arc::clone(&radio.modem),
        Arc::clone(&radio.position),
        sink,
        alarms,
        Some(store),
        &settings,
    ))
}
