//! Fail-closed boot and degraded inputs.
//!
//! GREEN when:
//! - the engine boots BLOCKED with traffic disabled whatever was persisted,
//!   and the first good tick only needs to enable traffic;
//! - persisted segment and TAC continuity carry across a restart;
//! - a persisted candidate never commits on the first sample after a
//!   restart, however long the process was down;
//! - a restored segment authorizes nothing until a fix matches the route
//!   again (position loss across a restart stays fail-closed);
//! - a persisted downtime is reported on recovery after restart;
//! - missing profile / segment / serving cell each block without
//!   deregistering (nothing was rejected);
//! - a clock step backwards never moves engine time backwards;
//! - the recent-tick history is bounded.

use rlce_engine::{
    DecisionEngine, EngineParams, EnforcementState, TickInput, DEFAULT_HISTORY_LEN,
};
use rlce_segment::Candidate;
use rlce_legitimacy::{LegitimacyEvaluator, LegitimacyParameters};
use rlce_schemas::{
    AlgorithmId, BlockCause, CalEntry, Decision, EnforcementEvent, MetricBaseline, Plmn,
    PositionSample, Rat, RouteProfile, Segment, SegmentExtent, ServingCellObservation, SibInfo,
    VerificationStatus,
};

fn route() -> RouteProfile {
    let cal = |pci: u16, tac: u32| CalEntry {
        plmn: Plmn::new("310260"),
        rat: Rat::Lte,
        channel: 66486,
        pci,
        cell_id: 81_000_000 + u64::from(pci),
        tac,
        baseline_rsrp: MetricBaseline::new(-95.0, 6.0),
        baseline_rsrq: MetricBaseline::new(-10.0, 3.0),
        baseline_sinr: MetricBaseline::new(12.0, 5.0),
        last_validated: "2026-03-01T00:00:00Z".parse().unwrap(),
        signature: String::new(),
    };
    RouteProfile {
        route_id: "BLUE-LINE".to_string(),
        epoch: 7,
        verification: VerificationStatus::Verified,
        segments: (0..4)
            .map(|i| Segment {
                index: i,
                extent: SegmentExtent::Chainage {
                    start_m: i as f64 * 1000.0,
                    end_m: (i + 1) as f64 * 1000.0,
                },
                cal: vec![cal(120 + i as u16, 8120 + i as u32)],
            })
            .collect(),
        route_baseline: None,
    }
}

fn cell_of(p: &RouteProfile, segment: usize) -> ServingCellObservation {
    let c = &p.segments[segment].cal[0];
    ServingCellObservation {
        plmn: c.plmn.clone(),
        rat: c.rat,
        channel: c.channel,
        pci: c.pci,
        cell_id: c.cell_id,
        tac: c.tac,
        rsrp_dbm: -95.0,
        rsrq_db: -10.0,
        sinr_db: 12.0,
        integrity_alg: Some(AlgorithmId(1)),
        cipher_alg: Some(AlgorithmId(1)),
        sib: SibInfo {
            barred: false,
            q_rx_lev_min_dbm: -118,
            broadcast_plmns: vec![c.plmn.clone()],
        },
        observed_at_ms: 0,
    }
}

fn engine(persisted: Option<EnforcementState>) -> DecisionEngine {
    let legit = LegitimacyParameters {
        allowed_plmns: [Plmn::new("310260")].into(),
        allowed_lte_channels: [66486].into(),
        ..LegitimacyParameters::default()
    };
    DecisionEngine::new(
        EngineParams::default(),
        LegitimacyEvaluator::new(legit),
        persisted,
    )
}

fn names(cmds: &[rlce_engine::RadioCommand]) -> Vec<&'static str> {
    cmds.iter().map(|c| c.name()).collect()
}

#[test]
fn boot_is_blocked_and_first_good_tick_enables() {
    let p = route();
    let mut e = engine(None);
    assert_eq!(e.decision(), Decision::Blocked);
    assert_eq!(e.state().block_cause, Some(BlockCause::Boot));
    assert!(!e.state().traffic_enabled);

    let pos = PositionSample::chainage(0, 100.0);
    let cell = cell_of(&p, 0);
    let out = e.tick(TickInput {
        now_ms: 0,
        profile: Some(&p),
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    assert_eq!(out.previous_decision, Decision::Blocked);
    assert_eq!(out.decision, Decision::Allowed);
    assert!(out.transitioned());
    assert_eq!(names(&out.commands), vec!["ENABLE_TRAFFIC"]);
}

#[test]
fn restart_keeps_segment_and_tac_but_not_the_decision() {
    let p = route();
    let mut first = engine(None);
    let pos = PositionSample::chainage(0, 2_500.0);
    let cell = cell_of(&p, 2);
    first.tick(TickInput {
        now_ms: 0,
        profile: Some(&p),
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    assert_eq!(first.decision(), Decision::Allowed);

    // Round trip through JSON, the way the runtime persists it.
    let raw = serde_json::to_string(first.state()).unwrap();
    let persisted: EnforcementState = serde_json::from_str(&raw).unwrap();
    let second = engine(Some(persisted));

    assert_eq!(second.decision(), Decision::Blocked);
    assert!(!second.state().traffic_enabled);
    assert_eq!(second.state().committed_segment, Some(2));
    assert_eq!(second.state().previous_tac, Some(8122));
    assert_eq!(second.state().profile_epoch, Some(7));
}

#[test]
fn restored_commit_survives_a_first_tick_in_the_next_segment() {
    let p = route();
    let persisted = EnforcementState {
        committed_segment: Some(1),
        ..EnforcementState::boot(None)
    };
    let mut e = engine(Some(persisted));
    // Just across the boundary; the dwell time has not elapsed.
    let pos = PositionSample::chainage(10_000, 2_010.0);
    let cell = cell_of(&p, 1);
    let out = e.tick(TickInput {
        now_ms: 10_000,
        profile: Some(&p),
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    assert_eq!(out.segment.and_then(|u| u.committed), Some(1));
    assert_eq!(e.state().candidate.map(|c| c.index), Some(2));
    assert_eq!(out.decision, Decision::Allowed);
}

#[test]
fn persisted_candidate_does_not_commit_after_an_outage() {
    let p = route();
    let persisted = EnforcementState {
        decision: Decision::Allowed,
        block_cause: None,
        committed_segment: Some(1),
        candidate: Some(Candidate {
            index: 2,
            since_ms: 1_000,
        }),
        traffic_enabled: true,
        ..EnforcementState::boot(None)
    };
    let mut e = engine(Some(persisted));
    assert_eq!(e.state().candidate, None);

    // An hour later, one sample inside segment 2.
    let t0 = 3_600_000;
    let cell = cell_of(&p, 2);
    let tick = |e: &mut DecisionEngine, t: i64| {
        let pos = PositionSample::chainage(t, 2_500.0);
        e.tick(TickInput {
            now_ms: t,
            profile: Some(&p),
            position: Some(&pos),
            serving_cell: Some(&cell),
        })
    };

    let out = tick(&mut e, t0);
    assert_eq!(out.segment.and_then(|u| u.committed), Some(1));
    assert_eq!(
        e.state().candidate,
        Some(Candidate {
            index: 2,
            since_ms: t0
        })
    );

    // The dwell runs from the first post-restart sample.
    let out = tick(&mut e, t0 + 1_750);
    assert_eq!(out.segment.and_then(|u| u.committed), Some(1));
    let out = tick(&mut e, t0 + 2_000);
    assert_eq!(out.segment.and_then(|u| u.committed), Some(2));
}

#[test]
fn restored_segment_needs_a_fix_before_it_authorizes() {
    let p = route();
    let persisted = EnforcementState {
        decision: Decision::Allowed,
        block_cause: None,
        committed_segment: Some(1),
        previous_tac: Some(8121),
        traffic_enabled: true,
        ..EnforcementState::boot(None)
    };
    let mut e = engine(Some(persisted));
    let cell = cell_of(&p, 1);

    for t in [3_600_000, 3_600_250, 3_604_000] {
        let out = e.tick(TickInput {
            now_ms: t,
            profile: Some(&p),
            position: None,
            serving_cell: Some(&cell),
        });
        assert_eq!(out.decision, Decision::Blocked, "t={t}");
        assert_eq!(out.block_cause, Some(BlockCause::PositionStale), "t={t}");
        assert!(
            !names(&out.commands).contains(&"ENABLE_TRAFFIC"),
            "t={t}: traffic stays off"
        );
    }

    let pos = PositionSample::chainage(3_604_250, 1_500.0);
    let out = e.tick(TickInput {
        now_ms: 3_604_250,
        profile: Some(&p),
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    assert_eq!(out.decision, Decision::Allowed);
    assert_eq!(names(&out.commands), vec!["ENABLE_TRAFFIC"]);
}

#[test]
fn persisted_downtime_is_reported_on_recovery() {
    let p = route();
    let persisted = EnforcementState {
        decision: Decision::Blocked,
        block_cause: Some(BlockCause::NotAuthorized),
        downtime_started_ms: Some(100),
        ..EnforcementState::boot(None)
    };
    let mut e = engine(Some(persisted));
    let pos = PositionSample::chainage(400, 100.0);
    let cell = cell_of(&p, 0);
    let out = e.tick(TickInput {
        now_ms: 400,
        profile: Some(&p),
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    assert_eq!(out.decision, Decision::Allowed);
    assert_eq!(out.recovered_after_ms, Some(300));
}

#[test]
fn missing_inputs_block_without_deregistering() {
    let p = route();
    let pos = PositionSample::chainage(0, 100.0);
    let cell = cell_of(&p, 0);

    // No profile.
    let mut e = engine(None);
    let out = e.tick(TickInput {
        now_ms: 0,
        profile: None,
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    assert_eq!(out.block_cause, Some(BlockCause::NoProfile));
    assert!(out.commands.is_empty(), "traffic is already off at boot");
    assert_eq!(out.events.len(), 1);
    let again = e.tick(TickInput {
        now_ms: 250,
        profile: None,
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    assert!(again.events.is_empty());

    // Profile but no fix yet.
    let mut e = engine(None);
    let out = e.tick(TickInput {
        now_ms: 0,
        profile: Some(&p),
        position: None,
        serving_cell: Some(&cell),
    });
    assert_eq!(out.block_cause, Some(BlockCause::NoSegment));

    // Serving cell read fails after traffic was enabled.
    let mut e = engine(None);
    e.tick(TickInput {
        now_ms: 0,
        profile: Some(&p),
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    let out = e.tick(TickInput {
        now_ms: 250,
        profile: Some(&p),
        position: Some(&pos),
        serving_cell: None,
    });
    assert_eq!(out.block_cause, Some(BlockCause::ServingCellUnavailable));
    assert_eq!(names(&out.commands), vec!["DISABLE_TRAFFIC"]);
    let EnforcementEvent::Block(ev) = &out.events[0] else {
        panic!("expected BLOCK event");
    };
    assert!(ev.observed_cell.is_none());
    assert!(ev.per_check_detail.is_none());
}

#[test]
fn engine_time_never_goes_backwards() {
    let p = route();
    let mut e = engine(None);
    let cell = cell_of(&p, 0);
    let pos = PositionSample::chainage(1_000, 100.0);
    let first = e.tick(TickInput {
        now_ms: 1_000,
        profile: Some(&p),
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    let back = e.tick(TickInput {
        now_ms: 400,
        profile: Some(&p),
        position: Some(&pos),
        serving_cell: Some(&cell),
    });
    assert_eq!(first.tick_ms, 1_000);
    assert_eq!(back.tick_ms, 1_000);
    assert_eq!(back.decision, Decision::Allowed);
}

#[test]
fn history_is_bounded_and_ordered() {
    let p = route();
    let mut e = engine(None);
    let cell = cell_of(&p, 0);
    for i in 0..20 {
        let pos = PositionSample::chainage(i * 250, 100.0);
        e.tick(TickInput {
            now_ms: i * 250,
            profile: Some(&p),
            position: Some(&pos),
            serving_cell: Some(&cell),
        });
    }
    let ticks: Vec<i64> = e.history().map(|h| h.tick_ms).collect();
    assert_eq!(ticks.len(), DEFAULT_HISTORY_LEN);
    assert_eq!(ticks.first(), Some(&(12 * 250)));
    assert_eq!(ticks.last(), Some(&(19 * 250)));
}
