//! Polygon with holes.

use super::{BoundingBox, Lines, Point, Polygon};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};

/// A polygon with holes: a counter-clockwise contour and clockwise holes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExPolygon {
    pub contour: Polygon,
    pub holes: Vec<Polygon>,
}

/// Collection of ExPolygons.
pub type ExPolygons = Vec<ExPolygon>;

impl ExPolygon {
    pub fn new(contour: Polygon) -> Self {
        Self {
            contour,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(contour: Polygon, holes: Vec<Polygon>) -> Self {
        Self { contour, holes }
    }

    pub fn add_hole(&mut self, hole: Polygon) {
        self.holes.push(hole);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.contour.is_valid()
    }

    /// Area of the contour minus holes, in scaled² units.
    pub fn area(&self) -> CoordF {
        self.contour.area() - self.holes.iter().map(|h| h.area()).sum::<CoordF>()
    }

    /// Contour oriented counter-clockwise and holes clockwise.
    pub fn orient(&mut self) {
        self.contour.make_counter_clockwise();
        for hole in &mut self.holes {
            hole.make_clockwise();
        }
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.contour.contains_point(p) && !self.holes.iter().any(|h| h.contains_point(p))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.contour.bounding_box()
    }

    /// Iterate the contour followed by the holes.
    pub fn loops(&self) -> impl Iterator<Item = &Polygon> {
        std::iter::once(&self.contour).chain(self.holes.iter())
    }

    /// All boundary edges, contour first.
    pub fn lines(&self) -> Lines {
        self.loops().flat_map(|p| p.lines()).collect()
    }

    pub fn remove_duplicate_points(&mut self, tolerance: Coord) {
        self.contour.remove_duplicate_points(tolerance);
        for hole in &mut self.holes {
            hole.remove_duplicate_points(tolerance);
        }
        self.holes.retain(|h| h.is_valid());
    }
}

impl From<Polygon> for ExPolygon {
    fn from(mut contour: Polygon) -> Self {
        contour.make_counter_clockwise();
        Self::new(contour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    #[test]
    fn test_area_with_hole() {
        let outer = Polygon::rectangle(Point::new(0, 0), Point::new(scale(10.0), scale(10.0)));
        let mut hole = Polygon::rectangle(
            Point::new(scale(4.0), scale(4.0)),
            Point::new(scale(6.0), scale(6.0)),
        );
        hole.make_clockwise();
        let ex = ExPolygon::with_holes(outer, vec![hole]);
        assert!((crate::unscale_area(ex.area()) - 96.0).abs() < 1e-9);
        assert!(!ex.contains_point(&Point::new(scale(5.0), scale(5.0))));
        assert!(ex.contains_point(&Point::new(scale(1.0), scale(5.0))));
        assert_eq!(ex.lines().len(), 8);
    }

    #[test]
    fn test_from_polygon_orients_contour() {
        let mut rect = Polygon::rectangle(Point::new(0, 0), Point::new(10, 10));
        rect.reverse();
        let ex: ExPolygon = rect.into();
        assert!(ex.contour.is_counter_clockwise());
    }
}
