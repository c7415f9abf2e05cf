//! rlce-schemas
//!
//! Shared data model for route-lock cellular enforcement: route profiles and
//! their cell access lists, serving-cell observations, position samples,
//! decisions and the append-only event records.
//!
//! All timestamps are epoch milliseconds supplied by the runtime. Nothing in
//! this crate reads a clock.

mod cell;
mod decision;
mod events;
mod observation;
mod position;
mod profile;

pub use cell::*;
pub use decision::*;
pub use events::*;
pub use observation::*;
pub use position::*;
pub use profile::*;

/// Milliseconds since the Unix epoch, as provided by the runtime clock.
pub type EpochMillis = i64;
