//! Scenario: the event log stops accepting writes.
//!
//! # Invariant under test
//!
//! Event-log trouble never changes a traffic decision. Records wait in a
//! bounded buffer and are written in order once the log is back; a
//! sustained outage raises EVENT_SINK_BACKLOG, and overflow raises
//! EVENT_SINK_DROPPED immediately.
//!
//! GREEN when:
//! - decisions and commands are identical with the log failing;
//! - buffered records land in order after recovery and the alarm clears;
//! - overflow discards the oldest record and raises the drop alarm.

use rlce_runtime::HealthAlarm;
use rlce_schemas::{BlockCause, Decision};
use rlce_testkit::fixtures::rogue_cell;
use rlce_testkit::{AlarmRecord, Harness, PositionScript};

#[tokio::test(start_paused = true)]
async fn failing_log_buffers_and_alarms_without_touching_decisions() {
    let mut h = Harness::builder().build();
    h.step().await;

    h.events.set_failing(true);
    h.modem.set_serving(Some(rogue_cell()));
    let r = h.step().await;
    assert_eq!(r.decision, Decision::Blocked);
    assert_eq!(
        r.commands,
        vec!["DISABLE_TRAFFIC", "DEREGISTER", "TRY_RESELECT"]
    );
    assert_eq!(r.events_emitted, 1);
    assert_eq!(r.events_written, 0);
    assert_eq!(r.events_pending, 1);

    h.step().await;
    assert_eq!(h.alarms.raised_count(HealthAlarm::EventSinkBacklog), 0);
    h.step().await;
    assert_eq!(h.alarms.raised_count(HealthAlarm::EventSinkBacklog), 1);

    // The reselect has landed by now; the buffered BLOCK is still pending.
    let r = h.step().await;
    assert_eq!(r.decision, Decision::Allowed);
    assert_eq!(h.enforcer.pending_events(), 1);
    assert!(h.events.events().is_empty());

    h.events.set_failing(false);
    let r = h.step().await;
    assert_eq!(r.events_written, 1);
    assert_eq!(r.events_pending, 0);
    assert_eq!(h.events.kinds(), vec!["BLOCK"]);
    assert_eq!(
        h.alarms.records(),
        vec![
            AlarmRecord::Raised(HealthAlarm::EventSinkBacklog),
            AlarmRecord::Cleared(HealthAlarm::EventSinkBacklog),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn overflow_drops_oldest_and_alarms_at_once() {
    let mut h = Harness::builder()
        .settings(|s| s.event_buffer_capacity = 2)
        .build();
    h.step().await;
    h.events.set_failing(true);

    // Three distinct block episodes: rogue, no fix, rogue again.
    h.modem.set_serving(Some(rogue_cell()));
    h.step().await;
    h.modem.set_serving(None);
    h.step().await;
    assert_eq!(h.alarms.raised_count(HealthAlarm::EventSinkDropped), 0);

    h.modem.set_serving(Some(rogue_cell()));
    h.step().await;
    assert_eq!(h.alarms.raised_count(HealthAlarm::EventSinkDropped), 1);
    assert_eq!(h.enforcer.pending_events(), 2);

    h.events.set_failing(false);
    h.step().await;
    let causes: Vec<_> = h
        .events
        .events()
        .iter()
        .map(|e| match e {
            rlce_schemas::EnforcementEvent::Block(b) => Some(b.cause),
            _ => None,
        })
        .collect();
    assert_eq!(
        causes,
        vec![
            Some(BlockCause::ServingCellUnavailable),
            Some(BlockCause::NotAuthorized),
        ]
    );
    assert!(h
        .alarms
        .records()
        .contains(&AlarmRecord::Cleared(HealthAlarm::EventSinkDropped)));
}

#[tokio::test(start_paused = true)]
async fn position_loss_is_logged_with_the_last_segment() {
    let mut h = Harness::builder().build();
    h.step().await;
    h.position.set(PositionScript::Lost);
    for _ in 0..22 {
        h.step().await;
    }
    let events = h.events.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        rlce_schemas::EnforcementEvent::Block(b) => {
            assert_eq!(b.cause, BlockCause::PositionStale);
            assert_eq!(b.segment_index, Some(0));
            assert!(b.position.is_none());
            assert_eq!(b.observed_cell.as_ref().map(|c| c.pci), Some(123));
        }
        other => panic!("unexpected event {other:?}"),
    }
}
