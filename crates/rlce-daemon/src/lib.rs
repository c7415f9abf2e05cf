//! rlce-daemon library target.
//!
//! Everything the binary wires together, exposed so the boot path can be
//! exercised in-process by the scenario tests.

pub mod boot;
pub mod env;
