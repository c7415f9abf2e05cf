//! Enforcement state with fail-closed boot semantics.
//!
//! # Invariants
//!
//! - **Boot is always BLOCKED**: whatever decision was persisted, the engine
//!   starts with traffic disabled. A persisted ALLOWED or FAIL_OPEN is not
//!   trusted; the first evaluated tick has to earn it again.
//!
//! - **Continuity survives restart**: the committed segment, the last
//!   trusted TAC and an in-progress downtime start are restored, so a reboot
//!   does not hide downtime. A pending candidate is dropped: its dwell was
//!   not observed across the outage.
//!
//! All logic is pure deterministic. No IO, no clock.

use rlce_schemas::{BlockCause, Decision, EpochMillis};
use rlce_segment::{Candidate, IndexerSnapshot};
use serde::{Deserialize, Serialize};

/// Durable engine state. Mutated only by the decision loop, once per tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementState {
    pub decision: Decision,
    /// Present iff `decision` is BLOCKED.
    pub block_cause: Option<BlockCause>,
    pub committed_segment: Option<usize>,
    pub candidate: Option<Candidate>,
    /// TAC of the last cell that was not rejected.
    pub previous_tac: Option<u32>,
    /// Set on entering BLOCKED, cleared on ALLOWED or FAIL_OPEN.
    pub downtime_started_ms: Option<EpochMillis>,
    /// Traffic state the engine last commanded.
    pub traffic_enabled: bool,
    pub profile_epoch: Option<u64>,
}

impl EnforcementState {
    /// Fail-closed boot.
    ///
    /// | Persisted                      | Boot decision        | Restored                          |
    /// |--------------------------------|----------------------|-----------------------------------|
    /// | `None`                         | `BLOCKED { Boot }`   | nothing                           |
    /// | `Some(ALLOWED / FAIL_OPEN)`    | `BLOCKED { Boot }`   | segment, TAC                      |
    /// | `Some(BLOCKED { cause })`      | `BLOCKED { Boot }`   | segment, TAC, downtime            |
    ///
    /// The restored segment does not authorize anything until a fix matches
    /// the route again.
    pub fn boot(persisted: Option<EnforcementState>) -> Self {
        let fresh = Self {
            decision: Decision::Blocked,
            block_cause: Some(BlockCause::Boot),
            committed_segment: None,
            candidate: None,
            previous_tac: None,
            downtime_started_ms: None,
            traffic_enabled: false,
            profile_epoch: None,
        };
        match persisted {
            None => fresh,
            Some(p) => Self {
                committed_segment: p.committed_segment,
                previous_tac: p.previous_tac,
                downtime_started_ms: match p.decision {
                    Decision::Blocked => p.downtime_started_ms,
                    Decision::Allowed | Decision::FailOpen => None,
                },
                profile_epoch: p.profile_epoch,
                ..fresh
            },
        }
    }

    pub fn indexer_snapshot(&self) -> IndexerSnapshot {
        IndexerSnapshot {
            committed: self.committed_segment,
            candidate: self.candidate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(decision: Decision) -> EnforcementState {
        EnforcementState {
            decision,
            block_cause: match decision {
                Decision::Blocked => Some(BlockCause::NotAuthorized),
                _ => None,
            },
            committed_segment: Some(4),
            candidate: Some(Candidate {
                index: 5,
                since_ms: 1_000,
            }),
            previous_tac: Some(8123),
            downtime_started_ms: Some(900),
            traffic_enabled: decision.traffic_enabled(),
            profile_epoch: Some(3),
        }
    }

    #[test]
    fn boot_without_record_is_blocked() {
        let s = EnforcementState::boot(None);
        assert_eq!(s.decision, Decision::Blocked);
        assert_eq!(s.block_cause, Some(BlockCause::Boot));
        assert!(!s.traffic_enabled);
    }

    #[test]
    fn boot_never_trusts_persisted_allowed() {
        for d in [Decision::Allowed, Decision::FailOpen] {
            let s = EnforcementState::boot(Some(persisted(d)));
            assert_eq!(s.decision, Decision::Blocked);
            assert!(!s.traffic_enabled);
            assert_eq!(s.committed_segment, Some(4));
            assert_eq!(s.previous_tac, Some(8123));
            assert_eq!(s.downtime_started_ms, None);
        }
    }

    #[test]
    fn boot_keeps_running_downtime() {
        let s = EnforcementState::boot(Some(persisted(Decision::Blocked)));
        assert_eq!(s.downtime_started_ms, Some(900));
        assert_eq!(s.block_cause, Some(BlockCause::Boot));
        assert_eq!(s.candidate, None);
    }
}
