use rlce_schemas::EpochMillis;

/// Source of tick timestamps.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> EpochMillis;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMillis {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Milliseconds since construction on tokio's clock, offset by `base_ms`.
/// Follows paused / advanced time in tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    base_ms: EpochMillis,
}

impl TokioClock {
    pub fn new(base_ms: EpochMillis) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            base_ms,
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> EpochMillis {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.base_ms.saturating_add(elapsed)
    }
}
