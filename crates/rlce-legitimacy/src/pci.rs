use rlce_schemas::ServingCellObservation;
use std::collections::{BTreeMap, BTreeSet};

use crate::EvaluationContext;

/// PCI sanity predicate. Reuse planning is deployment data, so the rule is
/// pluggable.
pub trait PciPolicy: Send + Sync {
    fn is_sane(&self, obs: &ServingCellObservation, ctx: &EvaluationContext<'_>) -> bool;
}

/// Table-driven reuse check:
/// - PCI within the RAT's defined range;
/// - not reserved on the observed channel;
/// - no raw collision with a window cell on the same RAT and channel that
///   carries the same PCI under a different global cell id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReuseTablePolicy {
    pub reserved: BTreeMap<u32, BTreeSet<u16>>,
}

impl ReuseTablePolicy {
    pub fn new(reserved: BTreeMap<u32, BTreeSet<u16>>) -> Self {
        Self { reserved }
    }
}

impl PciPolicy for ReuseTablePolicy {
    fn is_sane(&self, obs: &ServingCellObservation, ctx: &EvaluationContext<'_>) -> bool {
        if obs.pci > obs.rat.max_pci() {
            return false;
        }
        if self
            .reserved
            .get(&obs.channel)
            .is_some_and(|set| set.contains(&obs.pci))
        {
            return false;
        }
        let collides = ctx.window.is_some_and(|w| {
            w.entries().any(|e| {
                e.cal.rat == obs.rat
                    && e.cal.channel == obs.channel
                    && e.cal.pci == obs.pci
                    && e.cal.cell_id != obs.cell_id
            })
        });
        !collides
    }
}
