//! Uniform grid over line segments.
//!
//! Answers "which segments pass within a radius of this point" for the
//! boundary projector. Each segment is registered in every cell its bounding
//! box touches; queries scan the cells covering the query square and filter by
//! exact point-segment distance.

use crate::geometry::{BoundingBox, Line, Point};
use crate::Coord;

/// Upper bound on cells along one axis.
const MAX_CELLS_PER_AXIS: i64 = 1024;

/// Spatial index over a fixed set of line segments.
#[derive(Debug, Clone)]
pub struct EdgeGrid {
    lines: Vec<Line>,
    bbox: BoundingBox,
    cell_size: Coord,
    cols: i64,
    rows: i64,
    /// Segment indices per cell, row-major.
    cells: Vec<Vec<usize>>,
}

impl EdgeGrid {
    /// Build the index. `cell_size` is a hint in scaled units; it is enlarged
    /// when the grid would exceed the per-axis cell limit.
    pub fn new(lines: Vec<Line>, cell_size: Coord) -> Self {
        let mut bbox = BoundingBox::new();
        for line in &lines {
            bbox.merge_point(line.a);
            bbox.merge_point(line.b);
        }

        let size = bbox.size();
        let longest = size.x.max(size.y).max(1);
        let cell_size = cell_size.max(1).max(longest / MAX_CELLS_PER_AXIS + 1);
        let cols = size.x / cell_size + 1;
        let rows = size.y / cell_size + 1;

        let mut grid = Self {
            lines,
            bbox,
            cell_size,
            cols,
            rows,
            cells: vec![Vec::new(); (cols * rows) as usize],
        };

        for idx in 0..grid.lines.len() {
            let line = grid.lines[idx];
            let (c0, r0) = grid.cell_of(Point::new(line.a.x.min(line.b.x), line.a.y.min(line.b.y)));
            let (c1, r1) = grid.cell_of(Point::new(line.a.x.max(line.b.x), line.a.y.max(line.b.y)));
            for r in r0..=r1 {
                for c in c0..=c1 {
                    grid.cells[(r * grid.cols + c) as usize].push(idx);
                }
            }
        }
        grid
    }

    #[inline]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn cell_of(&self, p: Point) -> (i64, i64) {
        let c = ((p.x - self.bbox.min.x) / self.cell_size).clamp(0, self.cols - 1);
        let r = ((p.y - self.bbox.min.y) / self.cell_size).clamp(0, self.rows - 1);
        (c, r)
    }

    /// Indices of segments whose distance to `p` is at most `radius`,
    /// sorted ascending.
    pub fn lines_in_radius(&self, p: Point, radius: Coord) -> Vec<usize> {
        if self.lines.is_empty() {
            return Vec::new();
        }
        let mut query = BoundingBox::from_points(&[p]);
        query.offset(radius);
        if !query.overlaps(&self.bbox) {
            return Vec::new();
        }

        let (c0, r0) = self.cell_of(query.min);
        let (c1, r1) = self.cell_of(query.max);
        let radius_sq = radius as f64 * radius as f64;

        let mut found = Vec::new();
        for r in r0..=r1 {
            for c in c0..=c1 {
                for &idx in &self.cells[(r * self.cols + c) as usize] {
                    let line = &self.lines[idx];
                    if Line::distance_to_squared(p, line.a, line.b) <= radius_sq {
                        found.push(idx);
                    }
                }
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale;

    fn square_lines() -> Vec<Line> {
        let s = scale(20.0);
        vec![
            Line::from_coords(0, 0, s, 0),
            Line::from_coords(s, 0, s, s),
            Line::from_coords(s, s, 0, s),
            Line::from_coords(0, s, 0, 0),
        ]
    }

    #[test]
    fn test_lines_in_radius_finds_near_edges() {
        let grid = EdgeGrid::new(square_lines(), scale(1.0));
        let near_corner = grid.lines_in_radius(Point::new(scale(19.9), scale(0.1)), scale(0.4));
        assert_eq!(near_corner, vec![0, 1]);

        let center = grid.lines_in_radius(Point::new(scale(10.0), scale(10.0)), scale(0.4));
        assert!(center.is_empty());
    }

    #[test]
    fn test_far_point_finds_nothing() {
        let grid = EdgeGrid::new(square_lines(), scale(1.0));
        assert!(grid
            .lines_in_radius(Point::new(scale(100.0), scale(100.0)), scale(0.4))
            .is_empty());
    }

    #[test]
    fn test_long_line_spanning_many_cells() {
        let grid = EdgeGrid::new(vec![Line::from_coords(0, 0, scale(50.0), 0)], scale(0.5));
        assert_eq!(grid.lines_in_radius(Point::new(scale(37.3), scale(0.3)), scale(0.4)), vec![0]);
    }
}
