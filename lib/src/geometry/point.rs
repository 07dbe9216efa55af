//! Point types.
//!
//! [`Point`] stores scaled integer coordinates, [`PointF`] floating-point ones.
//! Voronoi and projection math runs on [`PointF`] in scaled units; everything
//! that ends up in a polygon is rounded back to [`Point`].

use crate::{scale, unscale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A 2D point with scaled integer coordinates.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

/// Collection of points.
pub type Points = Vec<Point>;

impl Point {
    #[inline]
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// Create a point from coordinates in mm.
    #[inline]
    pub fn new_scale(x: CoordF, y: CoordF) -> Self {
        Self::new(scale(x), scale(y))
    }

    /// Round a floating-point point (in scaled units) to the integer grid.
    #[inline]
    pub fn from_f64(p: PointF) -> Self {
        Self::new(p.x.round() as Coord, p.y.round() as Coord)
    }

    #[inline]
    pub fn to_f64(self) -> PointF {
        PointF::new(self.x as CoordF, self.y as CoordF)
    }

    /// Coordinates in mm.
    #[inline]
    pub fn to_mm(self) -> (CoordF, CoordF) {
        (unscale(self.x), unscale(self.y))
    }

    #[inline]
    pub fn dot(&self, other: &Point) -> i128 {
        self.x as i128 * other.x as i128 + self.y as i128 * other.y as i128
    }

    #[inline]
    pub fn cross(&self, other: &Point) -> i128 {
        self.x as i128 * other.y as i128 - self.y as i128 * other.x as i128
    }

    #[inline]
    pub fn length_squared(&self) -> i128 {
        self.dot(self)
    }

    #[inline]
    pub fn length(&self) -> CoordF {
        (self.length_squared() as CoordF).sqrt()
    }

    #[inline]
    pub fn distance_squared(&self, other: &Point) -> i128 {
        (*other - *self).length_squared()
    }

    #[inline]
    pub fn distance(&self, other: &Point) -> CoordF {
        (self.distance_squared(other) as CoordF).sqrt()
    }

    /// Check whether two points are within `tolerance` of each other on both axes.
    #[inline]
    pub fn coincides_with(&self, other: &Point, tolerance: Coord) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }

    /// Closest point to `self` on the segment `a`-`b`.
    pub fn project_onto_segment(&self, a: Point, b: Point) -> Point {
        let ab = b - a;
        let len_sq = ab.length_squared();
        if len_sq == 0 {
            return a;
        }
        let t = (*self - a).dot(&ab) as CoordF / len_sq as CoordF;
        if t <= 0.0 {
            a
        } else if t >= 1.0 {
            b
        } else {
            Point::new(
                (a.x as CoordF + t * ab.x as CoordF).round() as Coord,
                (a.y as CoordF + t * ab.y as CoordF).round() as Coord,
            )
        }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.to_mm();
        write!(f, "({:.4}, {:.4})", x, y)
    }
}

impl Add for Point {
    type Output = Point;

    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;

    #[inline]
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<CoordF> for Point {
    type Output = Point;

    #[inline]
    fn mul(self, rhs: CoordF) -> Point {
        Point::new(
            (self.x as CoordF * rhs).round() as Coord,
            (self.y as CoordF * rhs).round() as Coord,
        )
    }
}

/// A 2D point with floating-point coordinates.
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointF {
    pub x: CoordF,
    pub y: CoordF,
}

impl PointF {
    #[inline]
    pub const fn new(x: CoordF, y: CoordF) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(&self, other: &PointF) -> CoordF {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn cross(&self, other: &PointF) -> CoordF {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn length_squared(&self) -> CoordF {
        self.dot(self)
    }

    #[inline]
    pub fn length(&self) -> CoordF {
        self.length_squared().sqrt()
    }

    #[inline]
    pub fn distance(&self, other: &PointF) -> CoordF {
        (*other - *self).length()
    }

    /// Perpendicular vector (rotated 90 degrees counter-clockwise).
    #[inline]
    pub fn perp(&self) -> PointF {
        PointF::new(-self.y, self.x)
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    #[inline]
    pub fn normalize(&self) -> PointF {
        let len = self.length();
        if len > 0.0 {
            PointF::new(self.x / len, self.y / len)
        } else {
            PointF::default()
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Debug for PointF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Add for PointF {
    type Output = PointF;

    #[inline]
    fn add(self, rhs: PointF) -> PointF {
        PointF::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for PointF {
    type Output = PointF;

    #[inline]
    fn sub(self, rhs: PointF) -> PointF {
        PointF::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<CoordF> for PointF {
    type Output = PointF;

    #[inline]
    fn mul(self, rhs: CoordF) -> PointF {
        PointF::new(self.x * rhs, self.y * rhs)
    }
}

/// A 3D point with floating-point coordinates in mm (mesh vertices).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3F {
    pub x: CoordF,
    pub y: CoordF,
    pub z: CoordF,
}

impl Point3F {
    #[inline]
    pub const fn new(x: CoordF, y: CoordF, z: CoordF) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn sub(&self, other: &Point3F) -> Point3F {
        Point3F::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    #[inline]
    pub fn cross(&self, other: &Point3F) -> Point3F {
        Point3F::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Linear interpolation towards `other`.
    #[inline]
    pub fn lerp(&self, other: &Point3F, t: CoordF) -> Point3F {
        Point3F::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }

    /// Drop the Z coordinate and scale to integer XY.
    #[inline]
    pub fn to_point_xy(&self) -> Point {
        Point::new_scale(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_onto_segment_clamps() {
        let a = Point::new(0, 0);
        let b = Point::new(100, 0);
        assert_eq!(Point::new(50, 20).project_onto_segment(a, b), Point::new(50, 0));
        assert_eq!(Point::new(-30, 20).project_onto_segment(a, b), a);
        assert_eq!(Point::new(130, -5).project_onto_segment(a, b), b);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let v = PointF::new(0.0, 0.0).normalize();
        assert_eq!(v, PointF::new(0.0, 0.0));
        let u = PointF::new(3.0, 4.0).normalize();
        assert!((u.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cross_3d() {
        let x = Point3F::new(1.0, 0.0, 0.0);
        let y = Point3F::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(&y), Point3F::new(0.0, 0.0, 1.0));
    }
}
