use serde::{Deserialize, Serialize};

use crate::EpochMillis;

/// A point in the route's local planar frame, in metres.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanarPoint {
    pub x_m: f64,
    pub y_m: f64,
}

impl PlanarPoint {
    pub fn new(x_m: f64, y_m: f64) -> Self {
        Self { x_m, y_m }
    }

    pub fn distance_to(&self, other: &PlanarPoint) -> f64 {
        (self.x_m - other.x_m).hypot(self.y_m - other.y_m)
    }
}

/// Position reported by the fused GNSS/odometry source.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Coordinate {
    /// Geometric fix projected into the route's planar frame.
    Planar { x_m: f64, y_m: f64 },
    /// Linear-referenced distance along the route (odometry chainage).
    Chainage { m: f64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub timestamp_ms: EpochMillis,
    pub coord: Coordinate,
}

impl PositionSample {
    pub fn planar(timestamp_ms: EpochMillis, x_m: f64, y_m: f64) -> Self {
        Self {
            timestamp_ms,
            coord: Coordinate::Planar { x_m, y_m },
        }
    }

    pub fn chainage(timestamp_ms: EpochMillis, m: f64) -> Self {
        Self {
            timestamp_ms,
            coord: Coordinate::Chainage { m },
        }
    }
}
