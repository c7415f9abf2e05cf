use rlce_legitimacy::{EvaluationContext, LegitimacyEvaluator, LegitimacyResult};
use rlce_profile::{AuthorizedWindow, WindowBuilder, WindowKey};
use rlce_schemas::{
    BlockCause, BlockEvent, CellIdentity, Decision, EnforcementEvent, EpochMillis, FailOpenEvent,
    Rat,
};
use rlce_segment::SegmentIndexer;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use crate::{EngineParams, EnforcementState, RadioCommand, TickInput, TickOutcome, TickSummary};

/// What the last emitted event was about. A new event is only written when
/// this changes, so a steady state does not flood the log.
#[derive(Clone, Debug, PartialEq)]
enum EventKey {
    FailOpen {
        cell: CellIdentity,
        segment: usize,
    },
    Block {
        cause: BlockCause,
        cell: Option<CellIdentity>,
        segment: Option<usize>,
    },
}

/// Single owner of [`EnforcementState`]. One instance per vehicle; ticks
/// must be fed sequentially.
pub struct DecisionEngine {
    params: EngineParams,
    evaluator: LegitimacyEvaluator,
    indexer: SegmentIndexer,
    windows: WindowBuilder,
    state: EnforcementState,
    last_tick_ms: Option<EpochMillis>,
    last_event: Option<EventKey>,
    /// Cell and window the last deregister + reselect was issued for.
    rejected: Option<(CellIdentity, WindowKey)>,
    last_reselect_ms: Option<EpochMillis>,
    /// Window the radio was last pinned to.
    pinned: Option<WindowKey>,
    history: VecDeque<TickSummary>,
}

impl DecisionEngine {
    /// Start from `persisted` (if any) under fail-closed boot rules.
    pub fn new(
        params: EngineParams,
        evaluator: LegitimacyEvaluator,
        persisted: Option<EnforcementState>,
    ) -> Self {
        let state = EnforcementState::boot(persisted);
        let indexer = SegmentIndexer::restore(params.segment, state.indexer_snapshot());
        Self {
            history: VecDeque::with_capacity(params.history_len),
            params,
            evaluator,
            indexer,
            windows: WindowBuilder::new(),
            state,
            last_tick_ms: None,
            last_event: None,
            rejected: None,
            last_reselect_ms: None,
            pinned: None,
        }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn state(&self) -> &EnforcementState {
        &self.state
    }

    pub fn decision(&self) -> Decision {
        self.state.decision
    }

    /// Traffic was forced off at the radio outside the decision loop. The
    /// next tick that does not block re-issues ENABLE_TRAFFIC.
    pub fn note_traffic_disabled(&mut self) {
        self.state.traffic_enabled = false;
    }

    /// Most recent ticks, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Evaluate one tick.
    pub fn tick(&mut self, input: TickInput<'_>) -> TickOutcome {
        // Time never runs backwards inside the engine.
        let now = self
            .last_tick_ms
            .map_or(input.now_ms, |last| input.now_ms.max(last));
        self.last_tick_ms = Some(now);

        let before = self.state.clone();
        let serving = input.serving_cell;

        let segment = input.profile.map(|p| match input.position {
            Some(pos) => self.indexer.update(p, pos, now),
            None => self.indexer.observe_loss(Some(p), now),
        });

        let window: Option<Arc<AuthorizedWindow>> = match (input.profile, segment) {
            (Some(p), Some(u)) if !u.stale => u
                .committed
                .and_then(|k| self.windows.window_for(p, k, self.params.grace)),
            _ => None,
        };

        // ---------------------------------------------------------------
        // Classify
        // ---------------------------------------------------------------
        let mut in_window = None;
        let mut legitimacy: Option<LegitimacyResult> = None;

        let cause: Option<BlockCause> = match (input.profile, segment, &window) {
            (None, _, _) => Some(BlockCause::NoProfile),
            (Some(_), Some(u), _) if u.stale => Some(BlockCause::PositionStale),
            (Some(_), _, None) => Some(BlockCause::NoSegment),
            (Some(p), _, Some(w)) => match serving {
                None => Some(BlockCause::ServingCellUnavailable),
                Some(s) if w.contains_observation(s) => {
                    in_window = Some(true);
                    None
                }
                Some(s) => {
                    in_window = Some(false);
                    let ctx = EvaluationContext {
                        window: Some(w.as_ref()),
                        route_baseline: p.route_baseline.as_ref(),
                    };
                    let r = self.evaluator.evaluate(s, self.state.previous_tac, &ctx);
                    legitimacy = Some(r);
                    (!r.pass).then_some(BlockCause::NotAuthorized)
                }
            },
        };
        let decision = match (cause, in_window) {
            (Some(_), _) => Decision::Blocked,
            (None, Some(true)) => Decision::Allowed,
            (None, _) => Decision::FailOpen,
        };

        // ---------------------------------------------------------------
        // Commands
        // ---------------------------------------------------------------
        let enable = decision.traffic_enabled();
        let mut commands = Vec::new();

        if !enable && self.state.traffic_enabled {
            commands.push(RadioCommand::DisableTraffic);
        }

        if self.params.radio_pinning {
            if let Some(w) = &window {
                if self.pinned != Some(w.key()) {
                    commands.extend(pin_commands(w));
                    self.pinned = Some(w.key());
                }
            }
        }

        match (cause, serving, &window) {
            (Some(BlockCause::NotAuthorized), Some(s), Some(w)) => {
                let key = (s.identity(), w.key());
                let entering = before.block_cause != Some(BlockCause::NotAuthorized)
                    || self.rejected.as_ref() != Some(&key);
                let retry_due = !entering
                    && self.params.reselect_retry_ms.is_some_and(|every| {
                        self.last_reselect_ms
                            .map_or(true, |t| now.saturating_sub(t) >= every)
                    });

                if entering || retry_due {
                    commands.push(RadioCommand::Deregister);
                    if retry_due && self.params.lock_cell_escalation {
                        if let Some(target) = w.strongest_on(s.rat) {
                            commands.push(RadioCommand::LockCell {
                                cell: target.cal.identity(),
                            });
                        }
                    }
                    commands.push(RadioCommand::TryReselect {
                        window: Arc::clone(w),
                    });
                    self.last_reselect_ms = Some(now);
                }
                self.rejected = Some(key);
            }
            _ => {
                self.rejected = None;
                self.last_reselect_ms = None;
            }
        }

        if enable && !self.state.traffic_enabled {
            commands.push(RadioCommand::EnableTraffic);
        }

        // ---------------------------------------------------------------
        // State
        // ---------------------------------------------------------------
        if decision != Decision::Blocked {
            // A rejected cell's TAC never becomes the continuity reference.
            if let Some(s) = serving {
                self.state.previous_tac = Some(s.tac);
            }
        }

        let mut recovered_after_ms = None;
        if decision == Decision::Blocked {
            self.state.downtime_started_ms.get_or_insert(now);
        } else if let Some(start) = self.state.downtime_started_ms.take() {
            recovered_after_ms = Some(now.saturating_sub(start));
        }

        let snapshot = self.indexer.snapshot();
        self.state.decision = decision;
        self.state.block_cause = cause;
        self.state.committed_segment = snapshot.committed;
        self.state.candidate = snapshot.candidate;
        self.state.traffic_enabled = enable;
        if let Some(p) = input.profile {
            self.state.profile_epoch = Some(p.epoch);
        }

        // ---------------------------------------------------------------
        // Events
        // ---------------------------------------------------------------
        let committed = segment.and_then(|u| u.committed);
        let event_key = match decision {
            Decision::Allowed => None,
            Decision::FailOpen => match (serving, &window) {
                (Some(s), Some(w)) => Some(EventKey::FailOpen {
                    cell: s.identity(),
                    segment: w.segment_index(),
                }),
                _ => None,
            },
            Decision::Blocked => cause.map(|c| EventKey::Block {
                cause: c,
                cell: serving.filter(|_| c.rejects_cell()).map(|s| s.identity()),
                segment: committed,
            }),
        };

        let mut events = Vec::new();
        if event_key.is_some() && event_key != self.last_event {
            let position = input.position.copied();
            match (decision, serving, &window, legitimacy) {
                (Decision::FailOpen, Some(s), Some(w), Some(r)) => {
                    events.push(EnforcementEvent::FailOpen(FailOpenEvent {
                        timestamp_ms: now,
                        position,
                        segment_index: w.segment_index(),
                        profile_epoch: w.profile_epoch(),
                        observed_cell: s.clone(),
                        decision,
                        per_check_detail: r.checks,
                    }));
                }
                (Decision::Blocked, _, _, _) => {
                    if let Some(c) = cause {
                        events.push(EnforcementEvent::Block(BlockEvent {
                            timestamp_ms: now,
                            position,
                            segment_index: committed,
                            profile_epoch: input.profile.map(|p| p.epoch),
                            observed_cell: serving.cloned(),
                            decision,
                            cause: c,
                            per_check_detail: legitimacy.map(|r| r.checks),
                        }));
                    }
                }
                _ => {}
            }
        }
        self.last_event = event_key;

        self.record_history(TickSummary {
            tick_ms: now,
            decision,
            block_cause: cause,
            segment_index: committed,
            serving_cell: serving.map(|s| s.identity()),
            commands: commands.iter().map(RadioCommand::name).collect(),
        });

        TickOutcome {
            tick_ms: now,
            previous_decision: before.decision,
            decision,
            block_cause: cause,
            segment,
            window,
            in_window,
            legitimacy,
            commands,
            events,
            recovered_after_ms,
            state_changed: self.state != before,
        }
    }

    fn record_history(&mut self, summary: TickSummary) {
        if self.params.history_len == 0 {
            return;
        }
        while self.history.len() >= self.params.history_len {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }
}

/// Band mask over the window's channels, plus a forced PLMN when the window
/// spans exactly one.
fn pin_commands(w: &AuthorizedWindow) -> Vec<RadioCommand> {
    let channels = w.channels();
    let pick = |rat: Rat| -> BTreeSet<u32> {
        channels
            .iter()
            .filter(|(r, _)| *r == rat)
            .map(|(_, ch)| *ch)
            .collect()
    };
    let mut out = vec![RadioCommand::SetBandmask {
        lte: pick(Rat::Lte),
        nr: pick(Rat::Nr),
    }];
    let plmns = w.plmns();
    if plmns.len() == 1 {
        if let Some(plmn) = plmns.into_iter().next() {
            out.push(RadioCommand::ForcePlmn { plmn });
        }
    }
    out
}
