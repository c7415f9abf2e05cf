//! rlce-segment
//!
//! Position-to-segment mapping with anti-flapping hysteresis.
//!
//! - A segment change is committed only after the new nearest segment has
//!   been the candidate continuously for at least the dwell time.
//! - Off-route or missing positions hold the committed index and start the
//!   unmatched clock; past the timeout the result is flagged stale so the
//!   engine can fail closed.
//!
//! Pure deterministic logic. No IO, no wall-clock. The runtime provides
//! `now_ms` on every call.

mod geometry;
mod indexer;

pub use geometry::{distance_to_extent, distance_to_polyline, nearest_segment};
pub use indexer::*;
