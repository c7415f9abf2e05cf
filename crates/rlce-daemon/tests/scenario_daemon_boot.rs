//! Scenario: daemon boot path, end to end in-process.
//!
//! # Invariant under test
//!
//! The daemon refuses to start on invalid config, tolerates unused keys and
//! an unreadable state file (booting fresh, still fail-closed), and opens
//! the event log with a session header carrying the config hash before the
//! first decision.
//!
//! GREEN when:
//! - an out-of-range value fails with CONFIG_INVALID;
//! - an unknown key only warns;
//! - a corrupt state file boots fresh and is replaced on the first save;
//! - the event log starts with SESSION_START and stays a valid chain
//!   across restarts;
//! - the trace binding serves position through the background producer;
//! - a torn final log line is cut and noted with LOG_RECOVERED, and the
//!   daemon still boots;
//! - a log broken mid-file is set aside and a fresh chain started;
//! - an unwritable log location boots with the backlog alarm raised;
//! - the early fence turns traffic off before the log is opened;
//! - a profile reload installs a newer epoch and refuses an older one.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rlce_audit::{verify_hash_chain, VerifyResult};
use rlce_daemon::boot::{self, Radio};
use rlce_profile::ProfileStore;
use rlce_runtime::{
    Clock, HealthAlarm, ModemPort, PositionPort, RuntimeSettings, StateStore, TokioClock,
    TraceRecord,
};
use rlce_schemas::{Decision, PositionSample};
use rlce_testkit::fixtures::{demo_profile, observe, rogue_cell};
use rlce_testkit::{MemoryAlarmSink, MockModem, PositionScript, ScriptedPosition};
use tokio::sync::watch;

const T0: i64 = 1_700_000_000_000;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_yaml(dir: &Path, extra: &str) -> String {
    format!(
        r#"
vehicle:
  vehicle_id: TRAIN-042
loop:
  tick_interval_ms: 250
  io_timeout_ms: 150
legitimacy:
  allowed_plmns: ["310260", "311480"]
  allowed_channels:
    lte: [66486, 66490, 66500, 5140, 1302]
    nr: [523800, 627936]
storage:
  state_path: "{}"
  audit_path: "{}"
{extra}
"#,
        dir.join("state.json").display(),
        dir.join("events.jsonl").display(),
    )
}

fn write(dir: &Path, name: &str, body: &str) -> String {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p.display().to_string()
}

fn kinds(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["kind"].as_str().unwrap().to_string()
        })
        .collect()
}

struct Booted {
    enforcer: rlce_runtime::Enforcer,
    modem: MockModem,
    clock: Arc<dyn Clock>,
    config_hash: String,
}

fn boot_in(dir: &Path, base_ms: i64) -> Booted {
    let cfg_path = write(dir, "base.yaml", &config_yaml(dir, ""));
    let profile_path = write(
        dir,
        "profile.json",
        &serde_json::to_string(&demo_profile(3)).unwrap(),
    );

    let cfg = boot::load_config(&[cfg_path]).unwrap();
    let profiles = Arc::new(ProfileStore::new());
    boot::load_profile(&profiles, &profile_path).unwrap();

    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(base_ms));
    let modem = MockModem::new(Duration::from_millis(600));
    modem.set_serving(Some(observe(&demo_profile(3).segments[0].cal[0])));
    let radio = Radio {
        modem: Arc::new(modem.clone()),
        position: Arc::new(ScriptedPosition::new(
            Arc::clone(&clock),
            PositionScript::At(100.0),
        )),
        producer: None,
    };

    let enforcer = boot::assemble(
        &cfg,
        profiles,
        &radio,
        Arc::new(MemoryAlarmSink::new()),
        clock.now_ms(),
    )
    .unwrap();
    Booted {
        enforcer,
        modem,
        clock,
        config_hash: cfg.loaded.config_hash,
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[test]
fn out_of_range_config_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(dir.path(), "base.yaml", &config_yaml(dir.path(), ""));
    let bad = write(dir.path(), "bad.yaml", "loop:\n  tick_interval_ms: 1000\n");

    let err = boot::load_config(&[base, bad]).unwrap_err();
    assert!(format!("{err:#}").contains("CONFIG_INVALID"), "{err:#}");
}

#[test]
fn unknown_key_only_warns() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(
        dir.path(),
        "base.yaml",
        &config_yaml(dir.path(), "legacy:\n  modem_port: /dev/ttyUSB2\n"),
    );
    let cfg = boot::load_config(&[base]).unwrap();
    assert_eq!(cfg.enforcement.vehicle.vehicle_id, "TRAIN-042");
    assert_eq!(cfg.loaded.config_hash.len(), 64);
}

#[test]
fn unverified_profile_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = demo_profile(1);
    p.verification = rlce_schemas::VerificationStatus::Unverified;
    let path = write(dir.path(), "p.json", &serde_json::to_string(&p).unwrap());

    let store = ProfileStore::new();
    let err = boot::load_profile(&store, &path).unwrap_err();
    assert!(format!("{err:#}").contains("rejected"), "{err:#}");
    assert!(store.current().is_none());
}

// ---------------------------------------------------------------------------
// Boot
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn corrupt_state_boots_fresh_and_logs_a_session() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("state.json"), "{oops").unwrap();

    let mut b = boot_in(dir.path(), T0);
    assert_eq!(b.enforcer.state().committed_segment, None);

    let r = b.enforcer.tick(b.clock.now_ms()).await;
    assert_eq!(r.decision, Decision::Allowed);
    assert!(r.state_persisted);
    assert!(StateStore::new(dir.path().join("state.json"))
        .load()
        .unwrap()
        .is_some());

    tokio::time::advance(Duration::from_millis(250)).await;
    b.modem.set_serving(Some(rogue_cell()));
    let r = b.enforcer.tick(b.clock.now_ms()).await;
    assert_eq!(r.decision, Decision::Blocked);
    assert_eq!(r.events_written, 1);

    let log = dir.path().join("events.jsonl");
    assert_eq!(kinds(&log), vec!["SESSION_START", "BLOCK"]);
    assert!(matches!(
        verify_hash_chain(&log).unwrap(),
        VerifyResult::Valid { lines: 2, .. }
    ));

    let first: serde_json::Value =
        serde_json::from_str(std::fs::read_to_string(&log).unwrap().lines().next().unwrap())
            .unwrap();
    assert_eq!(first["payload"]["config_hash"], b.config_hash.as_str());
    assert_eq!(first["payload"]["vehicle_id"], "TRAIN-042");
    assert_eq!(first["payload"]["profile_epoch"], 3);
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_the_event_chain_and_state() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut b = boot_in(dir.path(), T0);
        b.enforcer.tick(b.clock.now_ms()).await;
        b.modem.set_serving(Some(rogue_cell()));
        tokio::time::advance(Duration::from_millis(250)).await;
        b.enforcer.tick(b.clock.now_ms()).await;
    }

    let mut b = boot_in(dir.path(), T0 + 60_000);
    assert_eq!(b.enforcer.state().committed_segment, Some(0));
    assert_eq!(b.enforcer.state().downtime_started_ms, Some(T0 + 250));

    let r = b.enforcer.tick(b.clock.now_ms()).await;
    assert_eq!(r.decision, Decision::Allowed);
    assert_eq!(r.recovered_after_ms, Some(59_750));

    let log = dir.path().join("events.jsonl");
    assert_eq!(kinds(&log), vec!["SESSION_START", "BLOCK", "SESSION_START"]);
    assert!(verify_hash_chain(&log).unwrap().is_valid());
}

#[tokio::test(start_paused = true)]
async fn trace_binding_feeds_position_through_the_producer() {
    let dir = tempfile::tempdir().unwrap();
    let cell = observe(&demo_profile(1).segments[0].cal[0]);
    let records = [
        TraceRecord {
            t_ms: 0,
            position: Some(PositionSample::chainage(0, 100.0)),
            serving_cell: Some(cell.clone()),
        },
        TraceRecord {
            t_ms: 1_000,
            position: None,
            serving_cell: Some(cell),
        },
    ];
    let body: String = records
        .iter()
        .map(|r| serde_json::to_string(r).unwrap() + "\n")
        .collect();
    let trace = write(dir.path(), "trace.jsonl", &body);

    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(T0));
    let settings = RuntimeSettings {
        vehicle_id: "BENCH".to_string(),
        tick_interval: Duration::from_millis(250),
        io_timeout: Duration::from_millis(150),
        retry_budget: 3,
        event_buffer_capacity: 16,
    };
    let (tx, rx) = watch::channel(false);
    let radio = boot::trace_radio(&trace, clock, &settings, rx).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let fix = radio.position.latest().await.unwrap();
    assert_eq!(fix.timestamp_ms, T0);
    assert_eq!(radio.modem.serving_cell().await.unwrap().pci, 123);

    // Past the second record the trace has no fix; the producer clears it.
    tokio::time::sleep(Duration::from_millis(1_300)).await;
    assert!(radio.position.latest().await.is_err());

    tx.send(true).unwrap();
    radio.producer.unwrap().await.unwrap();
}

// ---------------------------------------------------------------------------
// Damaged event log
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn torn_log_tail_is_cut_and_the_daemon_boots() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut b = boot_in(dir.path(), T0);
        b.enforcer.tick(b.clock.now_ms()).await;
        b.modem.set_serving(Some(rogue_cell()));
        tokio::time::advance(Duration::from_millis(250)).await;
        b.enforcer.tick(b.clock.now_ms()).await;
    }
    let log = dir.path().join("events.jsonl");
    let intact = std::fs::read_to_string(&log).unwrap();
    std::fs::write(&log, format!("{intact}{{\"event_id\":\"0f")).unwrap();

    let mut b = boot_in(dir.path(), T0 + 60_000);
    let r = b.enforcer.tick(b.clock.now_ms()).await;
    assert_eq!(r.decision, Decision::Allowed);

    assert_eq!(
        kinds(&log),
        vec!["SESSION_START", "BLOCK", "SESSION_START", "LOG_RECOVERED"]
    );
    assert!(verify_hash_chain(&log).unwrap().is_valid());
}

#[tokio::test(start_paused = true)]
async fn log_broken_mid_file_is_set_aside() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut b = boot_in(dir.path(), T0);
        b.enforcer.tick(b.clock.now_ms()).await;
        b.modem.set_serving(Some(rogue_cell()));
        tokio::time::advance(Duration::from_millis(250)).await;
        b.enforcer.tick(b.clock.now_ms()).await;
    }
    let log = dir.path().join("events.jsonl");
    let content = std::fs::read_to_string(&log).unwrap();
    let tampered = content.replacen("TRAIN-042", "TRAIN-043", 1);
    std::fs::write(&log, &tampered).unwrap();

    let restart_ms = T0 + 60_000;
    let _b = boot_in(dir.path(), restart_ms);

    let aside = dir.path().join(format!("events.jsonl.broken.{restart_ms}"));
    assert_eq!(std::fs::read_to_string(aside).unwrap(), tampered);
    assert_eq!(kinds(&log), vec!["SESSION_START"]);
    assert!(verify_hash_chain(&log).unwrap().is_valid());
}

#[tokio::test(start_paused = true)]
async fn unwritable_log_boots_blocked_with_backlog_alarm() {
    let dir = tempfile::tempdir().unwrap();
    // The log's parent is a regular file, so no log can be created there.
    let blocker = write(dir.path(), "blocker", "");
    let base = write(dir.path(), "base.yaml", &config_yaml(dir.path(), ""));
    let over = write(
        dir.path(),
        "over.yaml",
        &format!("storage:\n  audit_path: \"{blocker}/events.jsonl\"\n"),
    );
    let cfg = boot::load_config(&[base, over]).unwrap();
    let profiles = Arc::new(ProfileStore::with_profile(demo_profile(3)).unwrap());
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(T0));
    let modem = MockModem::new(Duration::from_millis(600));
    modem.set_serving(Some(observe(&demo_profile(3).segments[0].cal[0])));
    let radio = Radio {
        modem: Arc::new(modem.clone()),
        position: Arc::new(ScriptedPosition::new(
            Arc::clone(&clock),
            PositionScript::At(100.0),
        )),
        producer: None,
    };
    let alarms = MemoryAlarmSink::new();

    let mut enforcer = boot::assemble(
        &cfg,
        profiles,
        &radio,
        Arc::new(alarms.clone()),
        clock.now_ms(),
    )
    .unwrap();
    assert!(alarms.raised_count(HealthAlarm::EventSinkBacklog) >= 1);

    modem.set_serving(Some(rogue_cell()));
    let r = enforcer.tick(clock.now_ms()).await;
    assert_eq!(r.decision, Decision::Blocked);
    assert_eq!(r.events_written, 0);
    assert_eq!(modem.traffic_enabled(), Some(false));
}

#[tokio::test(start_paused = true)]
async fn early_fence_turns_traffic_off() {
    let modem = MockModem::new(Duration::from_millis(600));
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(T0));
    let radio = Radio {
        modem: Arc::new(modem.clone()),
        position: Arc::new(ScriptedPosition::new(clock, PositionScript::At(100.0))),
        producer: None,
    };

    assert!(boot::fence_radio(&radio, Duration::from_millis(150)).await);
    assert_eq!(modem.traffic_enabled(), Some(false));

    modem.set_fail_commands(true);
    assert!(!boot::fence_radio(&radio, Duration::from_millis(150)).await);
}

// ---------------------------------------------------------------------------
// Profile reload
// ---------------------------------------------------------------------------

#[test]
fn reload_installs_newer_epoch_and_refuses_older() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::with_profile(demo_profile(3)).unwrap();

    let newer = write(
        dir.path(),
        "p.json",
        &serde_json::to_string(&demo_profile(4)).unwrap(),
    );
    assert!(boot::reload_profile(&store, &newer));
    assert_eq!(store.epoch(), Some(4));

    let older = write(
        dir.path(),
        "p.json",
        &serde_json::to_string(&demo_profile(2)).unwrap(),
    );
    assert!(!boot::reload_profile(&store, &older));
    assert_eq!(store.epoch(), Some(4));

    std::fs::write(dir.path().join("p.json"), "{not json").unwrap();
    assert!(!boot::reload_profile(&store, &older));
    assert_eq!(store.epoch(), Some(4));
}
