use serde::{Deserialize, Serialize};

use crate::{BlockCause, Decision, EpochMillis, PositionSample, ServingCellObservation};

/// Outcome of each of the seven legitimacy criteria. Kept in full even when
/// every check passes so the audit record shows what was evaluated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegitimacyChecks {
    pub plmn_allowed: bool,
    pub tac_continuous: bool,
    pub frequency_allowed: bool,
    pub rf_envelope: bool,
    pub pci_sane: bool,
    pub sib_sane: bool,
    pub security_ok: bool,
}

impl LegitimacyChecks {
    pub const NAMES: [&'static str; 7] = [
        "plmn_allowed",
        "tac_continuous",
        "frequency_allowed",
        "rf_envelope",
        "pci_sane",
        "sib_sane",
        "security_ok",
    ];

    pub fn as_array(&self) -> [bool; 7] {
        [
            self.plmn_allowed,
            self.tac_continuous,
            self.frequency_allowed,
            self.rf_envelope,
            self.pci_sane,
            self.sib_sane,
            self.security_ok,
        ]
    }

    /// Logical AND of all seven checks.
    pub fn all_pass(&self) -> bool {
        self.as_array().iter().all(|ok| *ok)
    }

    /// Names of the checks that failed, in evaluation order.
    pub fn failed(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .zip(self.as_array())
            .filter(|(_, ok)| !*ok)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Traffic stayed enabled on an unlisted cell that passed every check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailOpenEvent {
    pub timestamp_ms: EpochMillis,
    pub position: Option<PositionSample>,
    pub segment_index: usize,
    pub profile_epoch: u64,
    pub observed_cell: ServingCellObservation,
    pub decision: Decision,
    pub per_check_detail: LegitimacyChecks,
}

/// Traffic was disabled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockEvent {
    pub timestamp_ms: EpochMillis,
    pub position: Option<PositionSample>,
    pub segment_index: Option<usize>,
    pub profile_epoch: Option<u64>,
    pub observed_cell: Option<ServingCellObservation>,
    pub decision: Decision,
    pub cause: BlockCause,
    /// Present only when the legitimacy checks were actually run.
    pub per_check_detail: Option<LegitimacyChecks>,
}

/// Record appended to the tamper-evident event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnforcementEvent {
    FailOpen(FailOpenEvent),
    Block(BlockEvent),
}

impl EnforcementEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EnforcementEvent::FailOpen(_) => "FAIL_OPEN",
            EnforcementEvent::Block(_) => "BLOCK",
        }
    }

    pub fn timestamp_ms(&self) -> EpochMillis {
        match self {
            EnforcementEvent::FailOpen(e) => e.timestamp_ms,
            EnforcementEvent::Block(e) => e.timestamp_ms,
        }
    }

    pub fn decision(&self) -> Decision {
        match self {
            EnforcementEvent::FailOpen(e) => e.decision,
            EnforcementEvent::Block(e) => e.decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_lists_names_in_order() {
        let checks = LegitimacyChecks {
            plmn_allowed: false,
            tac_continuous: true,
            frequency_allowed: true,
            rf_envelope: false,
            pci_sane: true,
            sib_sane: true,
            security_ok: true,
        };
        assert!(!checks.all_pass());
        assert_eq!(checks.failed(), vec!["plmn_allowed", "rf_envelope"]);
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let ev = EnforcementEvent::Block(BlockEvent {
            timestamp_ms: 1_000,
            position: None,
            segment_index: None,
            profile_epoch: None,
            observed_cell: None,
            decision: Decision::Blocked,
            cause: BlockCause::PositionStale,
            per_check_detail: None,
        });
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "BLOCK");
        assert_eq!(v["cause"], "POSITION_STALE");
        assert_eq!(v["decision"], "BLOCKED");
    }
}
