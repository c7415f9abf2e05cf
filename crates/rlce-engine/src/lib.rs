//! rlce-engine
//!
//! Three-state traffic decision machine: ALLOWED, FAIL_OPEN, BLOCKED.
//!
//! Per tick:
//! - serving cell in the authorized window => ALLOWED
//! - otherwise, passes every legitimacy check => FAIL_OPEN (logged)
//! - otherwise => BLOCKED (disable traffic, deregister, reselect, logged)
//!
//! Anything that prevents proving authorization (no profile, stale or
//! unmatched position, unreadable serving cell) is BLOCKED as well.
//!
//! The engine never talks to the radio. It returns the ordered commands and
//! event records; the runtime executes and persists them. Pure deterministic
//! logic. No IO, no wall-clock.

mod engine;
mod state;
mod types;

pub use engine::DecisionEngine;
pub use state::EnforcementState;
pub use types::*;
