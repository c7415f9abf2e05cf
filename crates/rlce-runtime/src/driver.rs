use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::{Clock, Enforcer, TickReport};

/// How the loop ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub last_report: Option<TickReport>,
}

/// Tick `enforcer` every `tick_interval` until `shutdown` turns true (or its
/// sender is dropped).
///
/// - A late tick is caught up, never skipped (`MissedTickBehavior::Burst`).
/// - Shutdown is only observed between ticks; an in-flight tick always
///   finishes its commands, event write and state persist.
/// - On exit the event buffer gets a final flush and the state a final save.
pub async fn run(
    mut enforcer: Enforcer,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> (Enforcer, RunSummary) {
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut summary = RunSummary {
        ticks: 0,
        last_report: None,
    };

    info!(
        tick_interval_ms = tick_interval.as_millis() as u64,
        "enforcement loop started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let report = enforcer.tick(clock.now_ms()).await;
        summary.ticks += 1;
        summary.last_report = Some(report);
    }

    enforcer.shutdown(clock.now_ms()).await;
    info!(ticks = summary.ticks, "enforcement loop stopped");
    (enforcer, summary)
}
