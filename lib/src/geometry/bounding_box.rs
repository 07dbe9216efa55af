//! Axis-aligned bounding boxes.

use super::{Point, PointF};
use crate::Coord;
use serde::{Deserialize, Serialize};

/// A 2D axis-aligned bounding box in scaled coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
    pub defined: bool,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundingBox {
    /// An empty (undefined) bounding box.
    pub const fn new() -> Self {
        Self {
            min: Point::new(0, 0),
            max: Point::new(0, 0),
            defined: false,
        }
    }

    pub fn from_points(points: &[Point]) -> Self {
        let mut bbox = Self::new();
        for p in points {
            bbox.merge_point(*p);
        }
        bbox
    }

    pub fn merge_point(&mut self, p: Point) {
        if self.defined {
            self.min.x = self.min.x.min(p.x);
            self.min.y = self.min.y.min(p.y);
            self.max.x = self.max.x.max(p.x);
            self.max.y = self.max.y.max(p.y);
        } else {
            self.min = p;
            self.max = p;
            self.defined = true;
        }
    }

    pub fn merge(&mut self, other: &BoundingBox) {
        if other.defined {
            self.merge_point(other.min);
            self.merge_point(other.max);
        }
    }

    /// Grow the box by `delta` on every side.
    pub fn offset(&mut self, delta: Coord) {
        if self.defined {
            self.min = Point::new(self.min.x - delta, self.min.y - delta);
            self.max = Point::new(self.max.x + delta, self.max.y + delta);
        }
    }

    #[inline]
    pub fn size(&self) -> Point {
        self.max - self.min
    }

    #[inline]
    pub fn contains(&self, p: &Point) -> bool {
        self.defined && p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Containment test for floating-point points given in scaled units.
    #[inline]
    pub fn contains_f(&self, p: &PointF) -> bool {
        self.defined
            && p.x >= self.min.x as f64
            && p.x <= self.max.x as f64
            && p.y >= self.min.y as f64
            && p.y <= self.max.y as f64
    }

    #[inline]
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.defined
            && other.defined
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_merge() {
        let mut bbox = BoundingBox::from_points(&[Point::new(0, 5), Point::new(10, -5)]);
        assert_eq!(bbox.min, Point::new(0, -5));
        assert_eq!(bbox.max, Point::new(10, 5));
        bbox.offset(1);
        assert!(bbox.contains(&Point::new(11, 6)));
        assert!(!bbox.contains(&Point::new(12, 0)));
        assert!(bbox.contains_f(&PointF::new(-0.5, 0.0)));
    }

    #[test]
    fn test_empty_box_contains_nothing() {
        let bbox = BoundingBox::new();
        assert!(!bbox.contains(&Point::new(0, 0)));
        assert!(!bbox.overlaps(&BoundingBox::from_points(&[Point::new(0, 0)])));
    }
}
