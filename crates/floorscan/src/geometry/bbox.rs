//! Bounding boxes and points.

use serde::{Deserialize, Serialize};

/// A point in plan pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Per-axis absolute difference to another point.
    pub fn distance(&self, other: &Point) -> CenterDistance {
        CenterDistance {
            dx: (self.x - other.x).abs(),
            dy: (self.y - other.y).abs(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Per-axis absolute distance between two centers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterDistance {
    pub dx: f64,
    pub dy: f64,
}

impl CenterDistance {
    /// Both axes are within `tolerance` (inclusive).
    pub fn within(&self, tolerance: f64) -> bool {
        self.dx <= tolerance && self.dy <= tolerance
    }
}

/// Axis-aligned bounding box: top-left corner plus extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inflate both boxes by `tolerance` on every side and test for overlap.
    ///
    /// Touching edges count as intersecting, so two boxes separated by a gap
    /// of exactly `2 * tolerance` intersect.
    pub fn intersects(&self, other: &BoundingBox, tolerance: f64) -> bool {
        let separated = self.right() + tolerance < other.x - tolerance
            || other.right() + tolerance < self.x - tolerance
            || self.bottom() + tolerance < other.y - tolerance
            || other.bottom() + tolerance < self.y - tolerance;
        !separated
    }

    pub fn validate(&self) -> Result<(), String> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(format!(
                "bounding box ({}, {}, {}, {}) has non-finite values",
                self.x, self.y, self.width, self.height
            ));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(format!(
                "bounding box has negative extent {}x{}",
                self.width, self.height
            ));
        }
        Ok(())
    }
}
