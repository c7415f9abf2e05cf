use rlce_schemas::{EpochMillis, PositionSample, RouteProfile};
use serde::{Deserialize, Serialize};

use crate::geometry::{distance_to_extent, nearest_segment};

/// Indexer tuning, from the `segment` config section.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentParams {
    /// Dwell time δ a candidate must persist before it is committed.
    pub hysteresis_ms: i64,
    /// A candidate must be closer than the committed segment by more than
    /// this many metres to count. 0 disables the spatial margin.
    pub switch_margin_m: f64,
    /// Unmatched or lost for longer than this marks the index stale.
    pub unmatched_timeout_ms: i64,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            hysteresis_ms: 2_000,
            switch_margin_m: 0.0,
            unmatched_timeout_ms: 5_000,
        }
    }
}

/// Segment waiting out the dwell time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub index: usize,
    pub since_ms: EpochMillis,
}

/// How the latest position related to the route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    /// The sample fell inside at least one segment extent.
    Matched,
    /// A fix was available but matched no segment (off-route).
    Unmatched,
    /// No usable fix this tick.
    Lost,
}

/// Result of one indexer step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentUpdate {
    /// Committed segment after this step.
    pub committed: Option<usize>,
    /// Nearest matching segment for this sample, before hysteresis.
    pub nearest: Option<usize>,
    pub status: PositionStatus,
    /// How long the position has been unmatched or lost, if it is.
    pub unmatched_for_ms: Option<i64>,
    /// Unmatched or lost for longer than the timeout, or not matched at all
    /// since a restore. The committed index must not be used to authorize
    /// cells while this is set.
    pub stale: bool,
    /// The committed index changed on this step.
    pub committed_changed: bool,
}

/// Persistable part of the indexer state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerSnapshot {
    pub committed: Option<usize>,
    pub candidate: Option<Candidate>,
}

#[derive(Clone, Debug)]
pub struct SegmentIndexer {
    params: SegmentParams,
    committed: Option<usize>,
    candidate: Option<Candidate>,
    /// Start of the current unmatched / lost streak.
    unmatched_since: Option<EpochMillis>,
    /// Epoch of the profile seen on the previous step.
    epoch: Option<u64>,
    /// A restored commit has not been confirmed by a matched fix yet.
    awaiting_fix: bool,
}

impl SegmentIndexer {
    pub fn new(params: SegmentParams) -> Self {
        Self {
            params,
            committed: None,
            candidate: None,
            unmatched_since: None,
            epoch: None,
            awaiting_fix: false,
        }
    }

    /// Resume from persisted state.
    ///
    /// The restored commit is held but reported stale until a fix matches
    /// the route again: how long the position was unknown while the process
    /// was down cannot be measured. A persisted candidate is discarded
    /// because its dwell was not observed continuously.
    pub fn restore(params: SegmentParams, snapshot: IndexerSnapshot) -> Self {
        Self {
            committed: snapshot.committed,
            awaiting_fix: snapshot.committed.is_some(),
            ..Self::new(params)
        }
    }

    pub fn params(&self) -> SegmentParams {
        self.params
    }

    pub fn committed(&self) -> Option<usize> {
        self.committed
    }

    pub fn candidate(&self) -> Option<Candidate> {
        self.candidate
    }

    pub fn snapshot(&self) -> IndexerSnapshot {
        IndexerSnapshot {
            committed: self.committed,
            candidate: self.candidate,
        }
    }

    /// Map `sample` against `profile` at `now_ms`.
    ///
    /// A sample older than the unmatched timeout is treated as a lost fix.
    pub fn update(
        &mut self,
        profile: &RouteProfile,
        sample: &PositionSample,
        now_ms: EpochMillis,
    ) -> SegmentUpdate {
        self.sync_epoch(profile);

        if now_ms.saturating_sub(sample.timestamp_ms) > self.params.unmatched_timeout_ms {
            // The last real fix is the start of the loss.
            return self.unmatched(PositionStatus::Lost, now_ms, Some(sample.timestamp_ms));
        }

        let Some((nearest, d_nearest)) = nearest_segment(profile, &sample.coord, self.committed)
        else {
            return self.unmatched(PositionStatus::Unmatched, now_ms, None);
        };
        self.unmatched_since = None;
        self.awaiting_fix = false;

        let before = self.committed;
        match self.committed {
            None => {
                // Nothing to flap away from.
                self.committed = Some(nearest);
                self.candidate = None;
            }
            Some(current) if current == nearest => {
                self.candidate = None;
            }
            Some(current) => {
                let d_current = profile
                    .segment(current)
                    .and_then(|s| distance_to_extent(&s.extent, &sample.coord))
                    .unwrap_or(f64::INFINITY);
                let beats_margin = self.params.switch_margin_m <= 0.0
                    || d_nearest + self.params.switch_margin_m < d_current;

                if !beats_margin {
                    self.candidate = None;
                } else {
                    let since = match self.candidate {
                        Some(c) if c.index == nearest => c.since_ms,
                        _ => now_ms,
                    };
                    if now_ms.saturating_sub(since) >= self.params.hysteresis_ms {
                        self.committed = Some(nearest);
                        self.candidate = None;
                    } else {
                        self.candidate = Some(Candidate {
                            index: nearest,
                            since_ms: since,
                        });
                    }
                }
            }
        }

        SegmentUpdate {
            committed: self.committed,
            nearest: Some(nearest),
            status: PositionStatus::Matched,
            unmatched_for_ms: None,
            stale: false,
            committed_changed: self.committed != before,
        }
    }

    /// No position fix this tick (read failure, timeout, or no GNSS).
    pub fn observe_loss(
        &mut self,
        profile: Option<&RouteProfile>,
        now_ms: EpochMillis,
    ) -> SegmentUpdate {
        if let Some(p) = profile {
            self.sync_epoch(p);
        }
        self.unmatched(PositionStatus::Lost, now_ms, None)
    }

    fn unmatched(
        &mut self,
        status: PositionStatus,
        now_ms: EpochMillis,
        since_hint: Option<EpochMillis>,
    ) -> SegmentUpdate {
        // Continuity of the candidate is broken.
        self.candidate = None;
        let start = since_hint.map_or(now_ms, |h| h.min(now_ms));
        let since = match self.unmatched_since {
            Some(s) => s.min(start),
            None => start,
        };
        self.unmatched_since = Some(since);
        let elapsed = now_ms.saturating_sub(since);
        SegmentUpdate {
            committed: self.committed,
            nearest: None,
            status,
            unmatched_for_ms: Some(elapsed),
            stale: self.awaiting_fix || elapsed > self.params.unmatched_timeout_ms,
            committed_changed: false,
        }
    }

    /// On a profile swap, pending candidates are dropped and a committed
    /// index the new profile does not have is forgotten.
    fn sync_epoch(&mut self, profile: &RouteProfile) {
        if self.epoch == Some(profile.epoch) {
            return;
        }
        let in_range = |i: usize| profile.last_index().is_some_and(|last| i <= last);
        if self.epoch.is_some() {
            self.candidate = None;
        }
        if self.committed.is_some_and(|c| !in_range(c)) {
            self.committed = None;
        }
        if self.candidate.is_some_and(|c| !in_range(c.index)) {
            self.candidate = None;
        }
        self.epoch = Some(profile.epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlce_schemas::{Segment, SegmentExtent, VerificationStatus};

    fn chainage_route(epoch: u64, n: usize) -> RouteProfile {
        RouteProfile {
            route_id: "R".to_string(),
            epoch,
            verification: VerificationStatus::Verified,
            segments: (0..n)
                .map(|i| Segment {
                    index: i,
                    extent: SegmentExtent::Chainage {
                        start_m: i as f64 * 100.0,
                        end_m: (i + 1) as f64 * 100.0,
                    },
                    cal: vec![],
                })
                .collect(),
            route_baseline: None,
        }
    }

    #[test]
    fn first_match_commits_immediately() {
        let p = chainage_route(1, 3);
        let mut ix = SegmentIndexer::new(SegmentParams::default());
        let u = ix.update(&p, &PositionSample::chainage(0, 150.0), 0);
        assert_eq!(u.committed, Some(1));
        assert!(u.committed_changed);
    }

    #[test]
    fn epoch_swap_forgets_out_of_range_commit() {
        let mut ix = SegmentIndexer::new(SegmentParams::default());
        ix.update(&chainage_route(1, 5), &PositionSample::chainage(0, 450.0), 0);
        assert_eq!(ix.committed(), Some(4));

        let shorter = chainage_route(2, 3);
        let u = ix.observe_loss(Some(&shorter), 100);
        assert_eq!(u.committed, None);
    }

    #[test]
    fn zero_hysteresis_commits_on_first_sample() {
        let p = chainage_route(1, 3);
        let mut ix = SegmentIndexer::new(SegmentParams {
            hysteresis_ms: 0,
            ..SegmentParams::default()
        });
        ix.update(&p, &PositionSample::chainage(0, 50.0), 0);
        let u = ix.update(&p, &PositionSample::chainage(250, 150.0), 250);
        assert_eq!(u.committed, Some(1));
    }

    #[test]
    fn restored_commit_is_stale_until_a_fix_matches() {
        let p = chainage_route(1, 3);
        let mut ix = SegmentIndexer::restore(
            SegmentParams::default(),
            IndexerSnapshot {
                committed: Some(1),
                candidate: Some(Candidate {
                    index: 2,
                    since_ms: 0,
                }),
            },
        );
        assert_eq!(ix.candidate(), None);

        let u = ix.observe_loss(Some(&p), 10_000);
        assert!(u.stale);
        assert_eq!(u.committed, Some(1));

        let u = ix.update(&p, &PositionSample::chainage(10_250, 150.0), 10_250);
        assert!(!u.stale);
        let u = ix.observe_loss(Some(&p), 10_500);
        assert!(!u.stale, "after a match, loss gets the normal timeout");
    }

    #[test]
    fn old_sample_counts_as_lost() {
        let p = chainage_route(1, 3);
        let mut ix = SegmentIndexer::new(SegmentParams::default());
        ix.update(&p, &PositionSample::chainage(0, 50.0), 0);
        let u = ix.update(&p, &PositionSample::chainage(0, 50.0), 6_000);
        assert_eq!(u.status, PositionStatus::Lost);
        assert!(u.stale, "a fix older than the timeout is already stale");
        assert_eq!(u.committed, Some(0), "committed index is held");
    }
}
