//! Geometry of objects placed on a floor plan.
//!
//! Coordinates are floating-point pixels in plan space. Construction is
//! permissive: a [`Geometry`] may hold negative extents or non-finite values
//! so that [`Geometry::validate`] can report the problem instead of the
//! constructor panicking.

mod bbox;

pub use bbox::{BoundingBox, CenterDistance, Point};

use serde::{Deserialize, Serialize};

/// Placement of an object on a plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    /// Axis-aligned bounding box.
    pub bounding_box: BoundingBox,

    /// Center point. Usually the box center, but detectors may report it
    /// independently.
    pub center: Point,

    /// Rotation in degrees, if the detector reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl Geometry {
    /// Build a geometry whose center is the middle of the box.
    pub fn from_bbox(bounding_box: BoundingBox) -> Self {
        Self {
            bounding_box,
            center: bounding_box.center(),
            rotation: None,
        }
    }

    /// Build a geometry with an explicit center.
    pub fn new(bounding_box: BoundingBox, center: Point) -> Self {
        Self {
            bounding_box,
            center,
            rotation: None,
        }
    }

    /// Set the rotation in degrees.
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = Some(degrees);
        self
    }

    /// Area of the bounding box.
    pub fn area(&self) -> f64 {
        self.bounding_box.area()
    }

    /// Whether the two bounding boxes, each inflated by `tolerance`, touch.
    pub fn intersects(&self, other: &Geometry, tolerance: f64) -> bool {
        self.bounding_box.intersects(&other.bounding_box, tolerance)
    }

    /// Per-axis absolute distance between the two centers.
    pub fn center_distance(&self, other: &Geometry) -> CenterDistance {
        self.center.distance(&other.center)
    }

    /// Check that every value is usable for spatial comparison.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.bounding_box.validate()?;
        if !self.center.is_finite() {
            return Err(format!(
                "center ({}, {}) is not finite",
                self.center.x, self.center.y
            ));
        }
        if let Some(rotation) = self.rotation {
            if !rotation.is_finite() {
                return Err(format!("rotation {} is not finite", rotation));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bbox_derives_center() {
        let geom = Geometry::from_bbox(BoundingBox::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(geom.center, Point::new(25.0, 40.0));
        assert_eq!(geom.area(), 1200.0);
    }

    #[test]
    fn test_validate_rejects_nan_center() {
        let geom = Geometry::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), Point::new(f64::NAN, 0.0));
        assert!(geom.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_infinite_rotation() {
        let geom = Geometry::from_bbox(BoundingBox::new(0.0, 0.0, 1.0, 1.0))
            .with_rotation(f64::INFINITY);
        assert!(geom.validate().is_err());
    }

    #[test]
    fn test_geometry_serializes_camel_case() {
        let geom = Geometry::from_bbox(BoundingBox::new(0.0, 0.0, 2.0, 2.0));
        let json = serde_json::to_value(geom).unwrap();
        assert!(json.get("boundingBox").is_some());
        assert!(json.get("rotation").is_none());
    }
}
