use rlce_schemas::{RouteProfile, SegmentExtent};
use std::collections::BTreeSet;

use crate::ProfileError;

/// Structural checks applied to every profile before it is accepted.
///
/// Epoch ordering is not checked here; that depends on what the store
/// already holds.
pub fn validate_profile(profile: &RouteProfile) -> Result<(), ProfileError> {
    if !profile.is_verified() {
        return Err(ProfileError::Unverified {
            route_id: profile.route_id.clone(),
        });
    }
    if profile.segments.is_empty() {
        return Err(ProfileError::EmptyProfile);
    }

    if let Some(b) = &profile.route_baseline {
        if !b.is_valid() {
            return Err(ProfileError::InvalidBaseline {
                segment: None,
                detail: format!("{b:?}"),
            });
        }
    }

    for (position, seg) in profile.segments.iter().enumerate() {
        if seg.index != position {
            return Err(ProfileError::NonContiguousIndex {
                position,
                found: seg.index,
            });
        }

        check_extent(seg.index, &seg.extent)?;

        let mut seen = BTreeSet::new();
        for entry in &seg.cal {
            let key = entry.key();
            if !seen.insert(key.clone()) {
                return Err(ProfileError::DuplicateCalEntry {
                    segment: seg.index,
                    key,
                });
            }
            if !entry.baseline().is_valid() {
                return Err(ProfileError::InvalidBaseline {
                    segment: Some(seg.index),
                    detail: format!("cell {}", entry.identity()),
                });
            }
        }
    }

    Ok(())
}

fn check_extent(segment: usize, extent: &SegmentExtent) -> Result<(), ProfileError> {
    let fail = |detail: String| Err(ProfileError::InvalidExtent { segment, detail });
    match extent {
        SegmentExtent::Path { points, corridor_m } => {
            if points.is_empty() {
                return fail("path has no points".to_string());
            }
            if points.iter().any(|p| !p.x_m.is_finite() || !p.y_m.is_finite()) {
                return fail("path point is not finite".to_string());
            }
            if !corridor_m.is_finite() || *corridor_m < 0.0 {
                return fail(format!("corridor_m={corridor_m}"));
            }
        }
        SegmentExtent::Chainage { start_m, end_m } => {
            if !start_m.is_finite() || !end_m.is_finite() || start_m >= end_m {
                return fail(format!("chainage [{start_m}, {end_m}) is empty"));
            }
        }
    }
    Ok(())
}
