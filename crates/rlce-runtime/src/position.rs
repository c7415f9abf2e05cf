//! Latest-value position feed.
//!
//! GNSS/odometry sampling runs on its own task and publishes into a watch
//! channel; the tick only ever reads the most recent value and never waits
//! for a new one.

use async_trait::async_trait;
use rlce_schemas::PositionSample;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{PortError, PositionPort};

/// Publisher half.
#[derive(Debug, Clone)]
pub struct PositionPublisher {
    tx: Arc<watch::Sender<Option<PositionSample>>>,
}

impl PositionPublisher {
    pub fn publish(&self, sample: PositionSample) {
        self.tx.send_replace(Some(sample));
    }

    /// Forget the last fix, e.g. when the receiver reports loss of lock.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

/// [`PositionPort`] that returns the last published sample.
#[derive(Debug, Clone)]
pub struct LatestPosition {
    rx: watch::Receiver<Option<PositionSample>>,
}

impl LatestPosition {
    pub fn channel() -> (PositionPublisher, LatestPosition) {
        let (tx, rx) = watch::channel(None);
        (PositionPublisher { tx: Arc::new(tx) }, LatestPosition { rx })
    }
}

#[async_trait]
impl PositionPort for LatestPosition {
    async fn latest(&self) -> Result<PositionSample, PortError> {
        (*self.rx.borrow()).ok_or(PortError::NoFix)
    }
}

/// Poll `source` every `every` and publish each fix. A failed poll clears
/// the published value so the tick sees the loss instead of an old fix.
/// Exits when `shutdown` turns true or its sender is dropped.
pub fn spawn_position_producer(
    source: Arc<dyn PositionPort>,
    publisher: PositionPublisher,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match source.latest().await {
                        Ok(sample) => publisher.publish(sample),
                        Err(e) => {
                            tracing::debug!(error = %e, "position poll failed");
                            publisher.clear();
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_feed_reports_no_fix() {
        let (_tx, port) = LatestPosition::channel();
        assert_eq!(port.latest().await, Err(PortError::NoFix));
    }

    #[tokio::test]
    async fn returns_most_recent_sample() {
        let (tx, port) = LatestPosition::channel();
        tx.publish(PositionSample::chainage(1, 10.0));
        tx.publish(PositionSample::chainage(2, 20.0));
        assert_eq!(port.latest().await, Ok(PositionSample::chainage(2, 20.0)));
        tx.clear();
        assert_eq!(port.latest().await, Err(PortError::NoFix));
    }
}
