//! Geometry primitives.
//!
//! This module provides the fundamental geometric types used by the segmentation:
//! - [`Point`] and [`PointF`] - 2D points with integer (scaled) and floating-point coordinates
//! - [`Point3F`] - 3D mesh vertex in mm
//! - [`Line`] - Line segment between two points
//! - [`Polygon`] - Closed polygon (boundary)
//! - [`ExPolygon`] - Polygon with holes (exterior + interior contours)
//! - [`BoundingBox`] - Axis-aligned bounding box
//!
//! ## Coordinate System
//!
//! Coordinates are scaled by `SCALING_FACTOR` (1,000,000), so 1 unit = 1 nanometer.
//!
//! - Use `scale()` to convert from mm to internal units
//! - Use `unscale()` to convert from internal units to mm

mod bounding_box;
mod expolygon;
mod line;
mod point;
mod polygon;
pub mod simplify;

pub use bounding_box::BoundingBox;
pub use expolygon::{ExPolygon, ExPolygons};
pub use line::{Line, Lines};
pub use point::{Point, Point3F, PointF, Points};
pub use polygon::{Polygon, Polygons};
pub use simplify::{douglas_peucker_by, simplify_polygon};

use crate::{Coord, CoordF};

/// Calculate the cross product of two 2D vectors (floating-point version).
#[inline]
pub fn cross2f(v1: PointF, v2: PointF) -> CoordF {
    v1.x * v2.y - v1.y * v2.x
}

/// Linear interpolation between two points.
#[inline]
pub fn lerp(a: Point, b: Point, t: CoordF) -> Point {
    Point::new(
        (a.x as CoordF + (b.x - a.x) as CoordF * t).round() as Coord,
        (a.y as CoordF + (b.y - a.y) as CoordF * t).round() as Coord,
    )
}

/// Linear interpolation between two points (floating-point version).
#[inline]
pub fn lerpf(a: PointF, b: PointF, t: CoordF) -> PointF {
    PointF::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

/// Intersection of the closed segments `a0`-`a1` and `b0`-`b1`.
///
/// Parallel segments report no intersection.
pub fn segment_intersection_f(a0: PointF, a1: PointF, b0: PointF, b1: PointF) -> Option<PointF> {
    let da = a1 - a0;
    let db = b1 - b0;
    let denom = cross2f(da, db);
    if denom == 0.0 {
        return None;
    }
    let diff = b0 - a0;
    let t = cross2f(diff, db) / denom;
    let u = cross2f(diff, da) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(lerpf(a0, a1, t))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp() {
        let a = Point::new(0, 0);
        let b = Point::new(100, 100);
        let mid = lerp(a, b, 0.5);
        assert_eq!(mid.x, 50);
        assert_eq!(mid.y, 50);
    }

    #[test]
    fn test_segment_intersection_f() {
        let p = segment_intersection_f(
            PointF::new(0.0, 0.0),
            PointF::new(1.0, 1.0),
            PointF::new(0.0, 1.0),
            PointF::new(1.0, 0.0),
        );
        let p = p.expect("diagonals cross");
        assert!((p.x - 0.5).abs() < 1e-12 && (p.y - 0.5).abs() < 1e-12);

        let none = segment_intersection_f(
            PointF::new(0.0, 0.0),
            PointF::new(1.0, 0.0),
            PointF::new(2.0, -1.0),
            PointF::new(2.0, 1.0),
        );
        assert!(none.is_none());
    }
}
