//! Path simplification algorithms.
//!
//! Douglas-Peucker reduction with a pluggable acceptance predicate. The plain
//! variant accepts a reduction when the furthest skipped point is within the
//! distance tolerance; the colored outline code plugs in a predicate that
//! additionally refuses to erase color transitions.

use super::{Line, Point, Polygon};
use crate::{scale, CoordF};

/// Douglas-Peucker reduction over arbitrary items carrying a point.
///
/// The first and last items are always kept. `take_floater(anchor, floater, max_dist_sq)`
/// decides whether every item strictly between `anchor` and `floater` may be dropped;
/// `max_dist_sq` is the squared distance (scaled units) of the furthest of them from
/// the segment anchor-floater. Adjacent anchor/floater pairs are always taken.
///
/// Iterative anchor/floater walk with an explicit stack, so deep inputs cannot
/// overflow the call stack.
pub fn douglas_peucker_by<T, P, F>(items: &[T], point_of: P, mut take_floater: F) -> Vec<T>
where
    T: Clone,
    P: Fn(&T) -> Point,
    F: FnMut(usize, usize, f64) -> bool,
{
    if items.len() <= 2 {
        return items.to_vec();
    }

    let mut result = Vec::with_capacity(items.len());
    result.push(items[0].clone());

    let mut anchor_idx = 0;
    let mut floater_idx = items.len() - 1;
    let mut stack: Vec<usize> = Vec::new();

    loop {
        let anchor = point_of(&items[anchor_idx]);
        let floater = point_of(&items[floater_idx]);

        // Find point furthest from the anchor-floater line
        let mut max_dist_sq = 0.0;
        let mut furthest_idx = anchor_idx;
        for (i, item) in items.iter().enumerate().take(floater_idx).skip(anchor_idx + 1) {
            let dist_sq = Line::distance_to_squared(point_of(item), anchor, floater);
            if dist_sq > max_dist_sq || furthest_idx == anchor_idx {
                max_dist_sq = dist_sq;
                furthest_idx = i;
            }
        }

        if furthest_idx == anchor_idx || take_floater(anchor_idx, floater_idx, max_dist_sq) {
            result.push(items[floater_idx].clone());
            anchor_idx = floater_idx;
            match stack.pop() {
                Some(next) => floater_idx = next,
                None => break,
            }
        } else {
            stack.push(floater_idx);
            floater_idx = furthest_idx;
        }
    }

    result
}

/// Douglas-Peucker line simplification.
///
/// # Arguments
///
/// * `points` - The input points to simplify
/// * `tolerance` - Maximum distance a point can deviate from the simplified path (in mm)
pub fn douglas_peucker(points: &[Point], tolerance: CoordF) -> Vec<Point> {
    let tolerance_sq = scale(tolerance) as f64 * scale(tolerance) as f64;
    douglas_peucker_by(points, |p| *p, |_, _, max_dist_sq| max_dist_sq <= tolerance_sq)
}

/// Douglas-Peucker simplification for a closed polygon.
///
/// The first point stays fixed; a result with fewer than three points is
/// returned as is so callers can drop it.
pub fn simplify_polygon(polygon: &Polygon, tolerance: CoordF) -> Polygon {
    let points = polygon.points();
    if points.len() <= 3 {
        return polygon.clone();
    }
    // Close the loop so the last edge is simplified too.
    let mut closed = points.to_vec();
    closed.push(points[0]);
    let mut simplified = douglas_peucker(&closed, tolerance);
    simplified.pop();
    Polygon::from_points(simplified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_douglas_peucker_straight_line() {
        let points: Vec<Point> = (0..=10).map(|i| Point::new(i * 1000, 0)).collect();
        let simplified = douglas_peucker(&points, 0.001);
        assert_eq!(simplified, vec![Point::new(0, 0), Point::new(10_000, 0)]);
    }

    #[test]
    fn test_douglas_peucker_keeps_corner() {
        let points = vec![
            Point::new(0, 0),
            Point::new(scale(5.0), 10),
            Point::new(scale(10.0), 0),
            Point::new(scale(10.0), scale(10.0)),
        ];
        let simplified = douglas_peucker(&points, 0.01);
        assert_eq!(
            simplified,
            vec![points[0], points[2], points[3]],
            "the 10 nm bump is dropped, the corner kept"
        );
    }

    #[test]
    fn test_douglas_peucker_by_predicate_can_refuse() {
        let points: Vec<Point> = (0..5).map(|i| Point::new(i * 10, 0)).collect();
        // Refusing every reduction keeps every point
        let kept = douglas_peucker_by(&points, |p| *p, |_, _, _| false);
        assert_eq!(kept, points);
    }

    #[test]
    fn test_simplify_polygon_removes_collinear() {
        let poly = Polygon::from_points(vec![
            Point::new(0, 0),
            Point::new(500, 0),
            Point::new(1000, 0),
            Point::new(1000, 1000),
            Point::new(0, 1000),
        ]);
        let simplified = simplify_polygon(&poly, 0.0001);
        assert_eq!(simplified.len(), 4);
    }
}
