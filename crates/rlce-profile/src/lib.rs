//! rlce-profile
//!
//! Holds the verified route profile and derives the authorized-cell window
//! from it.
//!
//! - [`ProfileStore`] accepts only verified, structurally valid profiles with
//!   a strictly newer epoch, and swaps them in atomically. A rejected load
//!   leaves the last-good profile in place.
//! - [`WindowBuilder`] computes `W(k)`, the union of the CALs of segments
//!   `k-g ..= k+g` clipped to the profile, and caches the result per
//!   `(k, epoch, g)`.

mod error;
mod store;
mod validate;
mod window;

pub use error::ProfileError;
pub use store::{decode_profile_json, load_profile_json, ProfileStore};
pub use validate::validate_profile;
pub use window::{build_window, AuthorizedWindow, WindowBuilder, WindowEntry, WindowKey};
