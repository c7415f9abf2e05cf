//! Scripted position source and in-memory sinks.

use async_trait::async_trait;
use rlce_runtime::{AlarmSink, Clock, EventSink, HealthAlarm, PortError, PositionPort, SinkError};
use rlce_schemas::{Coordinate, EnforcementEvent, PositionSample};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

// ---------------------------------------------------------------------------
// ScriptedPosition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionScript {
    /// Standing at a fixed chainage.
    At(f64),
    /// Moving from `start_m` at `speed_mps`, measured from `since_ms`.
    Moving {
        start_m: f64,
        speed_mps: f64,
        since_ms: i64,
    },
    /// No fix.
    Lost,
}

/// [`PositionPort`] whose answer is set by the test and stamped with the
/// shared clock.
#[derive(Clone)]
pub struct ScriptedPosition {
    script: Arc<Mutex<PositionScript>>,
    clock: Arc<dyn Clock>,
}

impl ScriptedPosition {
    pub fn new(clock: Arc<dyn Clock>, script: PositionScript) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            clock,
        }
    }

    pub fn set(&self, script: PositionScript) {
        *lock(&self.script) = script;
    }
}

#[async_trait]
impl PositionPort for ScriptedPosition {
    async fn latest(&self) -> Result<PositionSample, PortError> {
        let now = self.clock.now_ms();
        let m = match *lock(&self.script) {
            PositionScript::At(m) => m,
            PositionScript::Moving {
                start_m,
                speed_mps,
                since_ms,
            } => start_m + speed_mps * (now - since_ms) as f64 / 1_000.0,
            PositionScript::Lost => return Err(PortError::NoFix),
        };
        Ok(PositionSample {
            timestamp_ms: now,
            coord: Coordinate::Chainage { m },
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryEventSink
// ---------------------------------------------------------------------------

/// Event sink with switchable failure. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<EnforcementEvent>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<EnforcementEvent> {
        lock(&self.events).clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(|e| e.kind()).collect()
    }
}

impl EventSink for MemoryEventSink {
    fn append(&mut self, event: &EnforcementEvent) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Io("injected write failure".to_string()));
        }
        lock(&self.events).push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryAlarmSink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmRecord {
    Raised(HealthAlarm),
    Cleared(HealthAlarm),
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAlarmSink {
    log: Arc<Mutex<Vec<AlarmRecord>>>,
}

impl MemoryAlarmSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AlarmRecord> {
        lock(&self.log).clone()
    }

    pub fn raised_count(&self, alarm: HealthAlarm) -> usize {
        lock(&self.log)
            .iter()
            .filter(|r| **r == AlarmRecord::Raised(alarm))
            .count()
    }
}

impl AlarmSink for MemoryAlarmSink {
    fn raise(&self, alarm: HealthAlarm, _detail: &str) {
        lock(&self.log).push(AlarmRecord::Raised(alarm));
    }

    fn clear(&self, alarm: HealthAlarm) {
        lock(&self.log).push(AlarmRecord::Cleared(alarm));
    }
}
