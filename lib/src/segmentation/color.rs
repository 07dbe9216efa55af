//! Colored boundary primitives.
//!
//! A painted loop is stored as a [`ColorPolygon`] (one color per edge). Most
//! filtering happens on [`ColorPoint`]s, where each vertex knows the color of
//! the edge before and after it. The Voronoi segmentation consumes
//! [`ColoredLine`]s, which remember the loop they came from.

use crate::geometry::{Line, Point, Polygon};
use crate::CoordF;
use serde::{Deserialize, Serialize};

/// Paint state / extruder id. 0 is the default (unpainted) state.
pub type Color = u8;

/// A closed loop whose edge `i` (from point `i` to point `i + 1`) has color `colors[i]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPolygon {
    pub points: Vec<Point>,
    pub colors: Vec<Color>,
}

pub type ColorPolygons = Vec<ColorPolygon>;

impl ColorPolygon {
    pub fn new(points: Vec<Point>, colors: Vec<Color>) -> Self {
        debug_assert_eq!(points.len(), colors.len());
        Self { points, colors }
    }

    /// Loop with every edge painted `color`.
    pub fn uniform(points: Vec<Point>, color: Color) -> Self {
        let colors = vec![color; points.len()];
        Self { points, colors }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon::from_points(self.points.clone())
    }

    /// Absolute area in scaled² units.
    pub fn area(&self) -> CoordF {
        self.to_polygon().area()
    }
}

/// A boundary vertex with the colors of its incoming and outgoing edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPoint {
    pub p: Point,
    pub color_prev: Color,
    pub color_next: Color,
}

pub type ColorPoints = Vec<ColorPoint>;

impl ColorPoint {
    pub fn new(p: Point, color_prev: Color, color_next: Color) -> Self {
        Self {
            p,
            color_prev,
            color_next,
        }
    }
}

/// A painted boundary segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorLine {
    pub line: Line,
    pub color: Color,
}

pub type ColorLines = Vec<ColorLine>;

/// A colored outline segment together with its position in the loop set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColoredLine {
    pub line: Line,
    pub color: Color,
    pub poly_idx: usize,
    pub local_line_idx: usize,
}

pub type ColoredLines = Vec<ColoredLine>;

/// Vertices of a colored loop with the colors of their adjacent edges.
pub fn color_polygon_to_color_points(polygon: &ColorPolygon) -> ColorPoints {
    let n = polygon.points.len();
    (0..n)
        .map(|i| {
            let prev = if i == 0 { n - 1 } else { i - 1 };
            ColorPoint::new(polygon.points[i], polygon.colors[prev], polygon.colors[i])
        })
        .collect()
}

/// Closed loop of color points back to painted segments.
pub fn color_points_to_color_lines(points: &[ColorPoint]) -> ColorLines {
    let n = points.len();
    (0..n)
        .map(|i| ColorLine {
            line: Line::new(points[i].p, points[(i + 1) % n].p),
            color: points[i].color_next,
        })
        .collect()
}

/// Resolved outline loops to the segments the Voronoi segmentation works on.
pub fn color_points_to_colored_lines(loops: &[ColorPoints]) -> Vec<ColoredLines> {
    loops
        .iter()
        .enumerate()
        .map(|(poly_idx, points)| {
            color_points_to_color_lines(points)
                .into_iter()
                .enumerate()
                .map(|(local_line_idx, cl)| ColoredLine {
                    line: cl.line,
                    color: cl.color,
                    poly_idx,
                    local_line_idx,
                })
                .collect()
        })
        .collect()
}

/// True when, around the loop, the outgoing color of every point equals the
/// incoming color of the next one.
pub fn has_color_continuity(points: &[ColorPoint]) -> bool {
    let n = points.len();
    (0..n).all(|i| points[i].color_next == points[(i + 1) % n].color_prev)
}

/// Rewrite `color_prev`/`color_next` from per-edge colors (`edge_colors[i]` is
/// the color of the edge leaving point `i`).
pub(crate) fn apply_edge_colors(points: &mut [ColorPoint], edge_colors: &[Color]) {
    let n = points.len();
    for i in 0..n {
        points[i].color_next = edge_colors[i];
        points[i].color_prev = edge_colors[(i + n - 1) % n];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> ColorPolygon {
        ColorPolygon::new(
            vec![Point::new(0, 0), Point::new(100, 0), Point::new(0, 100)],
            vec![1, 2, 3],
        )
    }

    #[test]
    fn test_color_points_carry_adjacent_edge_colors() {
        let points = color_polygon_to_color_points(&triangle());
        assert_eq!(points[0], ColorPoint::new(Point::new(0, 0), 3, 1));
        assert_eq!(points[1], ColorPoint::new(Point::new(100, 0), 1, 2));
        assert!(has_color_continuity(&points));
    }

    #[test]
    fn test_color_lines_close_the_loop() {
        let lines = color_points_to_color_lines(&color_polygon_to_color_points(&triangle()));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].line, Line::new(Point::new(0, 100), Point::new(0, 0)));
        assert_eq!(lines[2].color, 3);
    }

    #[test]
    fn test_colored_lines_know_their_loop() {
        let loops = vec![
            color_polygon_to_color_points(&triangle()),
            color_polygon_to_color_points(&triangle()),
        ];
        let colored = color_points_to_colored_lines(&loops);
        assert_eq!(colored[1][2].poly_idx, 1);
        assert_eq!(colored[1][2].local_line_idx, 2);
    }

    #[test]
    fn test_continuity_detects_mismatch() {
        let mut points = color_polygon_to_color_points(&triangle());
        points[1].color_prev = 4;
        assert!(!has_color_continuity(&points));
        apply_edge_colors(&mut points, &[1, 2, 3]);
        assert!(has_color_continuity(&points));
    }
}
