//! rlce-testkit
//!
//! Fakes for every runtime port, the reference route, and a
//! harness that wires them into an [`Enforcer`] the way the daemon does.

pub mod fixtures;
pub mod mock_modem;
pub mod scripted;

pub use mock_modem::{MockModem, ModemCall};
pub use scripted::{AlarmRecord, MemoryAlarmSink, MemoryEventSink, PositionScript, ScriptedPosition};

use rlce_engine::{DecisionEngine, EngineParams, EnforcementState};
use rlce_legitimacy::LegitimacyEvaluator;
use rlce_profile::ProfileStore;
use rlce_runtime::{Clock, Enforcer, RuntimeSettings, StateStore, TokioClock};
use std::sync::Arc;
use std::time::Duration;

/// Everything a scenario needs a handle on after the enforcer is built.
pub struct Harness {
    pub enforcer: Enforcer,
    pub modem: MockModem,
    pub position: ScriptedPosition,
    pub events: MemoryEventSink,
    pub alarms: MemoryAlarmSink,
    pub profiles: Arc<ProfileStore>,
    pub clock: Arc<dyn Clock>,
    pub settings: RuntimeSettings,
}

/// Builder for [`Harness`] with the demo route loaded.
pub struct HarnessBuilder {
    params: EngineParams,
    settings: RuntimeSettings,
    t_reselect: Duration,
    store: Option<StateStore>,
    persisted: Option<EnforcementState>,
    start_m: f64,
    base_ms: i64,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            params: EngineParams::default(),
            settings: RuntimeSettings {
                vehicle_id: "TEST-01".to_string(),
                tick_interval: Duration::from_millis(250),
                io_timeout: Duration::from_millis(150),
                retry_budget: 3,
                event_buffer_capacity: 64,
            },
            t_reselect: Duration::from_millis(600),
            store: None,
            persisted: None,
            start_m: 100.0,
            base_ms: 1_700_000_000_000,
        }
    }
}

impl HarnessBuilder {
    pub fn params(mut self, params: EngineParams) -> Self {
        self.params = params;
        self
    }

    pub fn settings(mut self, f: impl FnOnce(&mut RuntimeSettings)) -> Self {
        f(&mut self.settings);
        self
    }

    pub fn t_reselect(mut self, d: Duration) -> Self {
        self.t_reselect = d;
        self
    }

    /// Persist to `store` and boot from whatever it holds.
    pub fn store(mut self, store: StateStore) -> anyhow::Result<Self> {
        self.persisted = store.load()?.map(|p| p.state);
        self.store = Some(store);
        Ok(self)
    }

    pub fn start_at(mut self, chainage_m: f64) -> Self {
        self.start_m = chainage_m;
        self
    }

    /// Wall-clock reading of the first tick.
    pub fn base_ms(mut self, ms: i64) -> Self {
        self.base_ms = ms;
        self
    }

    /// Must be called inside a tokio runtime (the clock reads tokio time).
    pub fn build(self) -> Harness {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(self.base_ms));
        let modem = MockModem::new(self.t_reselect);
        let profile = fixtures::demo_profile(1);
        let first = profile
            .segment((self.start_m / fixtures::DEMO_SEGMENT_M) as usize)
            .and_then(|s| s.cal.first())
            .map(fixtures::observe);
        modem.set_serving(first);

        let profiles = Arc::new(ProfileStore::new());
        // The demo profile always validates.
        let _ = profiles.load(profile);

        let position = ScriptedPosition::new(Arc::clone(&clock), PositionScript::At(self.start_m));
        let events = MemoryEventSink::new();
        let alarms = MemoryAlarmSink::new();

        let engine = DecisionEngine::new(
            self.params,
            LegitimacyEvaluator::new(fixtures::demo_legitimacy()),
            self.persisted,
        );
        let enforcer = Enforcer::new(
            engine,
            Arc::clone(&profiles),
            Arc::new(modem.clone()),
            Arc::new(position.clone()),
            Box::new(events.clone()),
            Arc::new(alarms.clone()),
            self.store,
            &self.settings,
        );

        Harness {
            enforcer,
            modem,
            position,
            events,
            alarms,
            profiles,
            clock,
            settings: self.settings,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Tick now, then let one tick interval of (paused) time pass.
    pub async fn step(&mut self) -> rlce_runtime::TickReport {
        let report = self.enforcer.tick(self.clock.now_ms()).await;
        tokio::time::advance(self.settings.tick_interval).await;
        report
    }
}
