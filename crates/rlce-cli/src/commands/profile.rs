//! `rlce profile check` and `rlce profile window`.

use anyhow::{Context, Result};
use rlce_profile::{build_window, load_profile_json, validate_profile};
use rlce_schemas::RouteProfile;

fn load(path: &str) -> Result<RouteProfile> {
    let profile = load_profile_json(path).with_context(|| format!("profile {path}"))?;
    validate_profile(&profile).with_context(|| format!("profile {path} invalid"))?;
    Ok(profile)
}

/// Validate the profile the same way the store would on load.
pub fn check(path: &str) -> Result<Vec<String>> {
    let p = load(path)?;
    let cells: usize = p.segments.iter().map(|s| s.cal.len()).sum();
    Ok(vec![format!(
        "profile_ok route_id={} epoch={} segments={} cal_entries={}",
        p.route_id,
        p.epoch,
        p.segments.len(),
        cells
    )])
}

/// Dump `W(segment)` with grace `grace`, one cell per line.
pub fn window(path: &str, segment: usize, grace: usize) -> Result<Vec<String>> {
    let p = load(path)?;
    let w = build_window(&p, segment, grace).with_context(|| {
        format!(
            "segment {segment} not in profile (last index {})",
            p.segments.len().saturating_sub(1)
        )
    })?;

    let mut out = vec![format!(
        "window segment={} grace={} epoch={} cells={}",
        segment,
        grace,
        p.epoch,
        w.len()
    )];
    let mut entries: Vec<_> = w.entries().collect();
    entries.sort_by_key(|e| (e.segment_index, e.cal.identity()));
    for e in entries {
        out.push(format!(
            "  from_segment={} cell={} rsrp={:.1}±{:.1}",
            e.segment_index,
            e.cal.identity(),
            e.cal.baseline_rsrp.mean,
            e.cal.baseline_rsrp.stddev
        ));
    }
    Ok(out)
}
