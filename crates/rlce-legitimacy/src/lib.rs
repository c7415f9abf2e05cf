//! rlce-legitimacy
//!
//! Seven-criterion legitimacy test for a serving cell that is outside the
//! authorized window:
//! - PLMN in the allowed set
//! - TAC continuity against the last trusted TAC
//! - channel in the allowed LTE / NR sets
//! - RSRP, RSRQ and SINR within one stddev of the applicable baseline
//! - PCI consistent with the reuse table
//! - SIB broadcast sane (not barred, PLMN list valid, qRxLevMin in range)
//! - non-null integrity and ciphering
//!
//! Every check is always evaluated, so the audit record carries the full
//! detail even when the aggregate passes.
//!
//! Deterministic, pure logic. No IO, no time.

mod baseline;
mod evaluator;
mod pci;
mod types;

pub use baseline::{BaselineSource, NearestCalBaseline, RouteBaselineOnly};
pub use evaluator::{evaluate, LegitimacyEvaluator};
pub use pci::{PciPolicy, ReuseTablePolicy};
pub use types::*;
