use rlce_schemas::{Coordinate, PlanarPoint, RouteProfile, SegmentExtent};

/// Shortest distance from `p` to the polyline through `points`.
/// A single point degenerates to point distance; no points is infinite.
pub fn distance_to_polyline(p: &PlanarPoint, points: &[PlanarPoint]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => p.distance_to(only),
        _ => points
            .windows(2)
            .map(|w| distance_to_leg(p, &w[0], &w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn distance_to_leg(p: &PlanarPoint, a: &PlanarPoint, b: &PlanarPoint) -> f64 {
    let (dx, dy) = (b.x_m - a.x_m, b.y_m - a.y_m);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return p.distance_to(a);
    }
    let t = (((p.x_m - a.x_m) * dx + (p.y_m - a.y_m) * dy) / len2).clamp(0.0, 1.0);
    p.distance_to(&PlanarPoint::new(a.x_m + t * dx, a.y_m + t * dy))
}

/// Matching distance of `coord` against one extent, or `None` when the
/// position does not fall inside it.
///
/// Path extents match planar fixes within the corridor. Chainage extents
/// match chainage positions in `[start_m, end_m)` and report the distance
/// to the interval midpoint, so overlapping intervals still rank.
pub fn distance_to_extent(extent: &SegmentExtent, coord: &Coordinate) -> Option<f64> {
    match (extent, coord) {
        (SegmentExtent::Path { points, corridor_m }, Coordinate::Planar { x_m, y_m }) => {
            let d = distance_to_polyline(&PlanarPoint::new(*x_m, *y_m), points);
            (d.is_finite() && d <= *corridor_m).then_some(d)
        }
        (SegmentExtent::Chainage { start_m, end_m }, Coordinate::Chainage { m }) => {
            (m.is_finite() && *m >= *start_m && *m < *end_m)
                .then(|| (m - (start_m + end_m) / 2.0).abs())
        }
        _ => None,
    }
}

/// Nearest matching segment and its distance. Ties go to `prefer` (the
/// committed segment) and then to the lower index.
pub fn nearest_segment(
    profile: &RouteProfile,
    coord: &Coordinate,
    prefer: Option<usize>,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for seg in &profile.segments {
        let Some(d) = distance_to_extent(&seg.extent, coord) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, bd)) => d < bd || (d == bd && prefer == Some(seg.index)),
        };
        if better {
            best = Some((seg.index, d));
        }
    }
    best
}
