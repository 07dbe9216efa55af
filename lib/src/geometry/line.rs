//! Line segment type.
//!
//! This module provides the Line type representing a line segment between two points.

use super::{Point, PointF};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A line segment defined by two endpoints.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line {
    pub a: Point,
    pub b: Point,
}

/// Collection of lines.
pub type Lines = Vec<Line>;

impl Line {
    /// Create a new line segment from two points.
    #[inline]
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Create a line from coordinates.
    #[inline]
    pub const fn from_coords(ax: Coord, ay: Coord, bx: Coord, by: Coord) -> Self {
        Self {
            a: Point::new(ax, ay),
            b: Point::new(bx, by),
        }
    }

    /// Create a line from floating-point coordinates (in mm).
    #[inline]
    pub fn from_coords_scale(ax: CoordF, ay: CoordF, bx: CoordF, by: CoordF) -> Self {
        Self {
            a: Point::new_scale(ax, ay),
            b: Point::new_scale(bx, by),
        }
    }

    /// Get the direction vector as floating-point.
    #[inline]
    pub fn direction_f(&self) -> PointF {
        self.b.to_f64() - self.a.to_f64()
    }

    /// Get the squared length of the line segment.
    #[inline]
    pub fn length_squared(&self) -> i128 {
        self.a.distance_squared(&self.b)
    }

    /// Get the length of the line segment.
    #[inline]
    pub fn length(&self) -> CoordF {
        self.a.distance(&self.b)
    }

    /// Calculate the distance from a point to this line segment.
    pub fn distance_to_point(&self, p: &Point) -> CoordF {
        let proj = p.project_onto_segment(self.a, self.b);
        p.distance(&proj)
    }

    /// Point at parameter `t` along the segment.
    #[inline]
    pub fn point_at(&self, t: CoordF) -> Point {
        super::lerp(self.a, self.b, t)
    }

    /// Static method: squared distance from a point to a line segment.
    pub fn distance_to_squared(p: Point, a: Point, b: Point) -> f64 {
        let proj = p.project_onto_segment(a, b);
        p.distance_squared(&proj) as f64
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line({:?} -> {:?})", self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_length() {
        let line = Line::from_coords(0, 0, 3, 4);
        assert_eq!(line.length_squared(), 25);
        assert!((line.length() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_distance_to_point() {
        let line = Line::from_coords(0, 0, 100, 0);
        assert!((line.distance_to_point(&Point::new(50, 30)) - 30.0).abs() < 1e-10);
        // Beyond the end the distance is measured to the endpoint
        assert!((line.distance_to_point(&Point::new(103, 4)) - 5.0).abs() < 1e-10);
    }
    #[test]
    fn test_point_at() {
        let line = Line::from_coords(0, 0, 100, 40);
        assert_eq!(line.point_at(0.5), Point::new(50, 20));
        assert_eq!(line.point_at(1.0), line.b);
    }
}
