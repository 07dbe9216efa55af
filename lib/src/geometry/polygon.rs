//! Closed polygon type.
//!
//! The closing edge from the last point back to the first is implicit;
//! the first point is never repeated at the end.

use super::{BoundingBox, Line, Lines, Point};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed polygon.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

/// Collection of polygons.
pub type Polygons = Vec<Polygon>;

impl Polygon {
    #[inline]
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    #[inline]
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle from two opposite corners, counter-clockwise.
    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::from_points(vec![
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A polygon needs at least three points to enclose any area.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3
    }

    /// Signed area in scaled² units (positive for counter-clockwise).
    pub fn signed_area(&self) -> CoordF {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum: i128 = 0;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            sum += p.cross(&q);
        }
        sum as CoordF * 0.5
    }

    /// Absolute area in scaled² units.
    #[inline]
    pub fn area(&self) -> CoordF {
        self.signed_area().abs()
    }

    #[inline]
    pub fn is_counter_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    #[inline]
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Orient counter-clockwise. Returns true if the polygon was reversed.
    pub fn make_counter_clockwise(&mut self) -> bool {
        if self.signed_area() < 0.0 {
            self.reverse();
            true
        } else {
            false
        }
    }

    /// Orient clockwise. Returns true if the polygon was reversed.
    pub fn make_clockwise(&mut self) -> bool {
        if self.signed_area() > 0.0 {
            self.reverse();
            true
        } else {
            false
        }
    }

    /// Edges including the closing edge.
    pub fn lines(&self) -> Lines {
        let n = self.points.len();
        if n < 2 {
            return Vec::new();
        }
        (0..n)
            .map(|i| Line::new(self.points[i], self.points[(i + 1) % n]))
            .collect()
    }

    /// Perimeter length in scaled units.
    pub fn length(&self) -> CoordF {
        self.lines().iter().map(|l| l.length()).sum()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }

    /// Even-odd point containment; points on the boundary may go either way.
    pub fn contains_point(&self, p: &Point) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > p.y) != (pj.y > p.y) {
                let x_cross = pj.x as CoordF
                    + (p.y - pj.y) as CoordF * (pi.x - pj.x) as CoordF / (pi.y - pj.y) as CoordF;
                if (p.x as CoordF) < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Drop consecutive points closer than `tolerance`, including across the closing edge.
    pub fn remove_duplicate_points(&mut self, tolerance: Coord) {
        let tolerance_sq = tolerance as i128 * tolerance as i128;
        let mut out: Vec<Point> = Vec::with_capacity(self.points.len());
        for &p in &self.points {
            match out.last() {
                Some(last) if last.distance_squared(&p) <= tolerance_sq => {}
                _ => out.push(p),
            }
        }
        while out.len() > 1 && out[0].distance_squared(&out[out.len() - 1]) <= tolerance_sq {
            out.pop();
        }
        self.points = out;
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

impl fmt::Debug for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.points.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    #[test]
    fn test_rectangle_area_and_orientation() {
        let rect = Polygon::rectangle(Point::new(0, 0), Point::new(scale(20.0), scale(10.0)));
        assert!(rect.is_counter_clockwise());
        assert!((crate::unscale_area(rect.area()) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_make_clockwise() {
        let mut rect = Polygon::rectangle(Point::new(0, 0), Point::new(10, 10));
        assert!(rect.make_clockwise());
        assert!(rect.signed_area() < 0.0);
        assert!(!rect.make_clockwise());
    }

    #[test]
    fn test_contains_point() {
        let rect = Polygon::rectangle(Point::new(0, 0), Point::new(100, 100));
        assert!(rect.contains_point(&Point::new(50, 50)));
        assert!(!rect.contains_point(&Point::new(150, 50)));
    }

    #[test]
    fn test_remove_duplicate_points_wraps() {
        let mut poly = Polygon::from_points(vec![
            Point::new(0, 0),
            Point::new(1, 0),
            Point::new(100, 0),
            Point::new(100, 100),
            Point::new(0, 1),
        ]);
        poly.remove_duplicate_points(2);
        assert_eq!(poly.len(), 3);
    }

    #[test]
    fn test_lines_close_the_loop() {
        let rect = Polygon::rectangle(Point::new(0, 0), Point::new(10, 10));
        let lines = rect.lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3].b, lines[0].a);
    }
}
