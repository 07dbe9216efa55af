//! Boundary Projector.
//!
//! The painted loops come from slicing the mesh and never match the layer
//! outline exactly. Every outline edge becomes a [`ProjectionLine`]; painted
//! segments close to it are projected onto it as [`ProjectionRange`]s, and the
//! nearest range wins locally. The result is one color per point of the true
//! outline, as color points ready for the Voronoi segmentation.

use super::color::{has_color_continuity, Color, ColorLine, ColorLines, ColorPoint, ColorPoints};
use super::color_lines::{douglas_peucker_colored, filter_color_of_small_segments};
use crate::clipper::{offset_expolygons, remove_small_and_small_holes, OffsetJoinType};
use crate::config::SegmentationConfig;
use crate::edge_grid::EdgeGrid;
use crate::geometry::{segment_intersection_f, simplify_polygon, ExPolygon, ExPolygons, Line, Point, PointF};
use crate::{scale, scaled, unscale, Coord, CoordF, SCALED_EPSILON};
use log::warn;

/// Part of a projection line covered by one painted segment, with the
/// distance of the painted segment at both ends (scaled units).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionRange {
    pub from_t: f64,
    pub from_distance: f64,
    pub to_t: f64,
    pub to_distance: f64,
    pub color: Color,
}

impl ProjectionRange {
    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        self.from_t <= t && t <= self.to_t
    }

    /// Linearly interpolated distance at `t`.
    pub fn distance_at(&self, t: f64) -> f64 {
        if self.to_t == self.from_t {
            return self.from_distance;
        }
        (t - self.from_t) / (self.to_t - self.from_t) * (self.to_distance - self.from_distance) + self.from_distance
    }

    fn profile(&self) -> (PointF, PointF) {
        (
            PointF::new(self.from_t, self.from_distance),
            PointF::new(self.to_t, self.to_distance),
        )
    }
}

/// From parameter `t` on (inclusive), the line has color `color_next`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorChange {
    pub t: f64,
    pub color_next: Color,
}

/// One edge of the outline with the ranges projected onto it.
#[derive(Clone, Debug)]
pub struct ProjectionLine {
    pub line: Line,
    pub ranges: Vec<ProjectionRange>,
    pub changes: Vec<ColorChange>,
}

impl ProjectionLine {
    pub fn new(line: Line) -> Self {
        Self {
            line,
            ranges: Vec::new(),
            changes: Vec::new(),
        }
    }
}

/// Projection lines of one outline loop, in loop order.
pub type ProjectionLines = Vec<ProjectionLine>;

/// Clean the layer outline before colors are projected onto it.
///
/// Closes hairline gaps, drops pieces and holes below `min_area` (mm²),
/// simplifies by half a micron and merges points closer than 0.01 mm.
pub fn prepare_outline(outline: &ExPolygons, min_area: CoordF) -> ExPolygons {
    let eps = unscale(SCALED_EPSILON);
    let mut grown = offset_expolygons(outline, 10.0 * eps, OffsetJoinType::Miter);
    remove_small_and_small_holes(&mut grown, min_area);
    let shrunk = offset_expolygons(&grown, -10.0 * eps, OffsetJoinType::Miter);

    shrunk
        .into_iter()
        .filter_map(|ex| {
            let mut cleaned = ExPolygon::with_holes(
                simplify_polygon(&ex.contour, 5.0 * eps),
                ex.holes.iter().map(|h| simplify_polygon(h, 5.0 * eps)).collect(),
            );
            cleaned.remove_duplicate_points(scale(0.01));
            cleaned.contour.is_valid().then_some(cleaned)
        })
        .collect()
}

/// One list of projection lines per outline loop (contours, then holes).
pub fn create_projection_lines(outline: &ExPolygons) -> Vec<ProjectionLines> {
    outline
        .iter()
        .flat_map(|ex| ex.loops())
        .filter(|loop_| loop_.is_valid())
        .map(|loop_| loop_.lines().into_iter().map(ProjectionLine::new).collect())
        .collect()
}

/// Project a painted segment onto a projection line.
///
/// Returns `None` when the projection is degenerate or both ends are farther
/// than `max_distance` (scaled). When only one end is too far, the range is
/// cut where the distance crosses `max_distance`.
pub fn project_color_line(
    color_line: &ColorLine,
    projection_line: &Line,
    max_distance: f64,
) -> Option<ProjectionRange> {
    let base = projection_line.a.to_f64();
    let line_vec = projection_line.direction_f();
    let vec_a = color_line.line.a.to_f64() - base;
    let vec_b = color_line.line.b.to_f64() - base;

    let len_sq = line_vec.length_squared();
    if len_sq == 0.0 {
        return None;
    }

    let t_a_raw = vec_a.dot(&line_vec) / len_sq;
    let t_b_raw = vec_b.dot(&line_vec) / len_sq;
    let t_a = t_a_raw.clamp(0.0, 1.0);
    let t_b = t_b_raw.clamp(0.0, 1.0);
    if t_a == t_b {
        return None;
    }

    let distance_to_color_line = |t_raw: f64, t_clamped: f64, v: PointF| -> f64 {
        if (0.0..=1.0).contains(&t_raw) {
            (line_vec * t_clamped - v).length()
        } else {
            let nearest: Point = if t_raw < 0.0 { projection_line.a } else { projection_line.b };
            color_line.line.distance_to_point(&nearest)
        }
    };
    let dist_a = distance_to_color_line(t_a_raw, t_a, vec_a);
    let dist_b = distance_to_color_line(t_b_raw, t_b, vec_b);

    let mut range = if t_a < t_b {
        ProjectionRange {
            from_t: t_a,
            from_distance: dist_a,
            to_t: t_b,
            to_distance: dist_b,
            color: color_line.color,
        }
    } else {
        ProjectionRange {
            from_t: t_b,
            from_distance: dist_b,
            to_t: t_a,
            to_distance: dist_a,
            color: color_line.color,
        }
    };

    let from_far = range.from_distance > max_distance;
    let to_far = range.to_distance > max_distance;
    match (from_far, to_far) {
        (false, false) => Some(range),
        (true, true) => None,
        _ => {
            let t_max = (max_distance - range.from_distance) / (range.to_distance - range.from_distance)
                * (range.to_t - range.from_t)
                + range.from_t;
            if from_far {
                range.from_t = t_max;
                range.from_distance = max_distance;
            } else {
                range.to_t = t_max;
                range.to_distance = max_distance;
            }
            Some(range)
        }
    }
}

/// Project painted segments onto nearby outline edges and outline edges onto
/// nearby painted segments, collecting the ranges on the projection lines.
pub fn collect_projection_ranges(loops: &mut [ProjectionLines], color_lines: &[ColorLines], max_distance: Coord) {
    let cell_size = 4 * max_distance.max(1);
    let max_distance_f = max_distance as f64;

    // Painted segment -> nearby outline edges.
    let mapping: Vec<(usize, usize)> = loops
        .iter()
        .enumerate()
        .flat_map(|(loop_idx, lines)| (0..lines.len()).map(move |line_idx| (loop_idx, line_idx)))
        .collect();
    let outline_grid = EdgeGrid::new(
        mapping.iter().map(|&(l, i)| loops[l][i].line).collect(),
        cell_size,
    );
    for color_line in color_lines.iter().flatten() {
        let mut nearest = outline_grid.lines_in_radius(color_line.line.a, max_distance);
        nearest.extend(outline_grid.lines_in_radius(color_line.line.b, max_distance));
        nearest.sort_unstable();
        nearest.dedup();

        for idx in nearest {
            let (loop_idx, line_idx) = mapping[idx];
            let projection_line = &mut loops[loop_idx][line_idx];
            if let Some(range) = project_color_line(color_line, &projection_line.line, max_distance_f) {
                projection_line.ranges.push(range);
            }
        }
    }

    // Outline edge -> nearby painted segments.
    let flat_color_lines: Vec<&ColorLine> = color_lines.iter().flatten().collect();
    let color_grid = EdgeGrid::new(flat_color_lines.iter().map(|cl| cl.line).collect(), cell_size);
    for projection_line in loops.iter_mut().flatten() {
        let mut nearest = color_grid.lines_in_radius(projection_line.line.a, max_distance);
        nearest.extend(color_grid.lines_in_radius(projection_line.line.b, max_distance));
        nearest.sort_unstable();
        nearest.dedup();

        for idx in nearest {
            if let Some(range) = project_color_line(flat_color_lines[idx], &projection_line.line, max_distance_f) {
                projection_line.ranges.push(range);
            }
        }
    }
}

/// Turn the collected ranges of one line into color changes: between
/// consecutive event points the range with the smallest distance trapezoid
/// wins.
pub fn resolve_color_changes(projection_line: &mut ProjectionLine) {
    let ranges = &mut projection_line.ranges;
    ranges.sort_by(|a, b| {
        a.from_t
            .total_cmp(&b.from_t)
            .then(a.from_distance.total_cmp(&b.from_distance))
            .then(a.to_t.total_cmp(&b.to_t))
            .then(a.to_distance.total_cmp(&b.to_distance))
            .then(a.color.cmp(&b.color))
    });
    ranges.dedup();

    let mut events: Vec<f64> = ranges.iter().flat_map(|r| [r.from_t, r.to_t]).collect();
    for (i, curr) in ranges.iter().enumerate() {
        for next in &ranges[i + 1..] {
            if curr.to_t == next.from_t {
                continue;
            } else if !curr.contains(next.from_t) {
                break;
            }
            let (c0, c1) = curr.profile();
            let (n0, n1) = next.profile();
            if let Some(crossing) = segment_intersection_f(c0, c1, n0, n1) {
                events.push(crossing.x);
            }
        }
    }
    events.sort_by(f64::total_cmp);
    events.dedup();

    let mut changes: Vec<ColorChange> = Vec::new();
    for window in events.windows(2) {
        let (start, end) = (window[0], window[1]);
        let winner = ranges
            .iter()
            .filter(|r| r.contains(start) && r.contains(end))
            .map(|r| (r.distance_at(start) + r.distance_at(end), r.color))
            .min_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, color)) = winner {
            if changes.last().map(|c| c.color_next) != Some(color) {
                changes.push(ColorChange { t: start, color_next: color });
            }
        }
    }
    projection_line.changes = changes;
}

/// Snap changes near the line ends onto the ends and merge changes that are
/// closer than `snap_distance` (scaled) or repeat the previous color.
pub fn filter_color_changes(projection_line: &mut ProjectionLine, snap_distance: f64) {
    let changes = &mut projection_line.changes;
    if changes.is_empty() {
        return;
    }
    changes.sort_by(|a, b| a.t.total_cmp(&b.t));
    let line_length = projection_line.line.length();

    let near_start = changes.iter().take_while(|c| c.t * line_length < snap_distance).count();
    if near_start >= 1 {
        changes[0].t = 0.0;
        let last_color = changes[near_start - 1].color_next;
        for change in &mut changes[1..near_start] {
            change.color_next = last_color;
        }
    }

    let near_end = changes
        .iter()
        .rev()
        .take_while(|c| (1.0 - c.t) * line_length < snap_distance)
        .count();
    if near_end >= 1 {
        let last_color = changes[changes.len() - 1].color_next;
        changes.truncate(changes.len() - (near_end - 1));
        if let Some(last) = changes.last_mut() {
            last.t = 1.0;
            last.color_next = last_color;
        }
    }

    if changes.len() > 1 {
        let mut filtered: Vec<ColorChange> = Vec::with_capacity(changes.len());
        for change in changes.iter() {
            match filtered.last_mut() {
                Some(last) if last.color_next == change.color_next => {}
                Some(last) if (change.t - last.t) * line_length < snap_distance => {
                    last.color_next = change.color_next;
                }
                _ => filtered.push(*change),
            }
        }
        *changes = filtered;
    }
}

/// Color at the start of a loop: the first line's change at its start, else
/// the color left by the last line that has any change, else the default.
fn first_line_color(lines: &[ProjectionLine]) -> Color {
    if let Some(first) = lines.first().and_then(|l| l.changes.first()) {
        if first.t == 0.0 {
            return first.color_next;
        }
    }
    lines
        .iter()
        .rev()
        .find_map(|l| l.changes.last())
        .map_or(0, |c| c.color_next)
}

/// Walk the lines of one loop and emit the colored outline points.
fn loop_to_color_points(lines: &[ProjectionLine]) -> ColorPoints {
    let mut points = Vec::with_capacity(lines.len());
    let mut prev_color = first_line_color(lines);
    let mut curr_color = prev_color;

    for projection_line in lines {
        let changes = &projection_line.changes;
        if changes.first().map_or(true, |c| c.t != 0.0) {
            points.push(ColorPoint::new(projection_line.line.a, prev_color, curr_color));
            prev_color = curr_color;
        }
        for change in changes {
            if change.t != 1.0 {
                points.push(ColorPoint::new(
                    projection_line.line.point_at(change.t),
                    prev_color,
                    change.color_next,
                ));
                curr_color = change.color_next;
                prev_color = curr_color;
            }
        }
        if let Some(last) = changes.last() {
            if last.t == 1.0 {
                curr_color = last.color_next;
            }
        }
    }
    points
}

/// Resolve, simplify and filter the colored points of every outline loop.
pub fn projection_lines_to_color_points(loops: &[ProjectionLines], config: &SegmentationConfig) -> Vec<ColorPoints> {
    loops
        .iter()
        .filter(|lines| !lines.is_empty())
        .filter_map(|lines| {
            let points = loop_to_color_points(lines);
            let mut filtered =
                douglas_peucker_colored(&points, config.input_filter_tolerance, config.color_filter_distance);
            if filtered.len() < 3 {
                return None;
            }
            filter_color_of_small_segments(&mut filtered, config.color_filter_distance);
            if !has_color_continuity(&filtered) {
                warn!("Outline loop with {} points lost color continuity", filtered.len());
            }
            Some(filtered)
        })
        .collect()
}

/// The whole projector for one layer: prepared outline plus painted segments
/// in, colored outline loops out.
pub fn project_colors(outline: &ExPolygons, color_lines: &[ColorLines], config: &SegmentationConfig) -> Vec<ColorPoints> {
    let mut loops = create_projection_lines(outline);
    collect_projection_ranges(&mut loops, color_lines, scale(config.max_projection_distance));

    let snap_distance = scaled(config.max_snap_distance);
    for projection_line in loops.iter_mut().flatten() {
        resolve_color_changes(projection_line);
        filter_color_changes(projection_line, snap_distance);
    }
    projection_lines_to_color_points(&loops, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::segmentation::color::color_points_to_color_lines;

    fn pt(x: f64, y: f64) -> Point {
        Point::new_scale(x, y)
    }

    fn color_line(a: Point, b: Point, color: Color) -> ColorLine {
        ColorLine {
            line: Line::new(a, b),
            color,
        }
    }

    fn square_mm(size: f64) -> ExPolygons {
        vec![Polygon::rectangle(pt(0.0, 0.0), pt(size, size)).into()]
    }

    /// Painted square loop offset slightly from the outline, colored per side.
    fn painted_square(size: f64, shift: f64, colors: [Color; 4]) -> ColorLines {
        let p = [
            pt(shift, shift),
            pt(size + shift, shift),
            pt(size + shift, size + shift),
            pt(shift, size + shift),
        ];
        (0..4).map(|i| color_line(p[i], p[(i + 1) % 4], colors[i])).collect()
    }

    #[test]
    fn test_project_parallel_segment() {
        let outline = Line::new(pt(0.0, 0.0), pt(10.0, 0.0));
        let painted = color_line(pt(2.0, 0.1), pt(6.0, 0.1), 3);
        let range = project_color_line(&painted, &outline, scaled(0.4)).expect("in range");
        assert!((range.from_t - 0.2).abs() < 1e-9);
        assert!((range.to_t - 0.6).abs() < 1e-9);
        assert!((range.from_distance - scaled(0.1)).abs() < 1.0);
        assert_eq!(range.color, 3);
    }

    #[test]
    fn test_project_far_segment_gives_nothing() {
        let outline = Line::new(pt(0.0, 0.0), pt(10.0, 0.0));
        let painted = color_line(pt(2.0, 1.0), pt(6.0, 1.0), 1);
        assert!(project_color_line(&painted, &outline, scaled(0.4)).is_none());
    }

    #[test]
    fn test_project_truncates_at_max_distance() {
        // Distance grows from 0 at x = 0 to 0.8 mm at x = 8.
        let outline = Line::new(pt(0.0, 0.0), pt(10.0, 0.0));
        let painted = color_line(pt(0.0, 0.0), pt(8.0, 0.8), 2);
        let range = project_color_line(&painted, &outline, scaled(0.4)).expect("partially in range");
        assert_eq!(range.from_t, 0.0);
        assert!((range.to_t - 0.4).abs() < 1e-6);
        assert!((range.to_distance - scaled(0.4)).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_range_wins() {
        let mut line = ProjectionLine::new(Line::new(pt(0.0, 0.0), pt(10.0, 0.0)));
        line.ranges.push(ProjectionRange {
            from_t: 0.0,
            from_distance: scaled(0.3),
            to_t: 1.0,
            to_distance: scaled(0.3),
            color: 1,
        });
        line.ranges.push(ProjectionRange {
            from_t: 0.5,
            from_distance: scaled(0.1),
            to_t: 1.0,
            to_distance: scaled(0.1),
            color: 2,
        });
        resolve_color_changes(&mut line);
        assert_eq!(
            line.changes,
            vec![
                ColorChange { t: 0.0, color_next: 1 },
                ColorChange { t: 0.5, color_next: 2 },
            ]
        );
    }

    #[test]
    fn test_crossing_profiles_split_the_line() {
        // Color 1 approaches the line towards t = 1, color 2 recedes; they cross at t = 0.5.
        let mut line = ProjectionLine::new(Line::new(pt(0.0, 0.0), pt(10.0, 0.0)));
        line.ranges.push(ProjectionRange {
            from_t: 0.0,
            from_distance: scaled(0.3),
            to_t: 1.0,
            to_distance: scaled(0.1),
            color: 1,
        });
        line.ranges.push(ProjectionRange {
            from_t: 0.0,
            from_distance: scaled(0.1),
            to_t: 1.0,
            to_distance: scaled(0.3),
            color: 2,
        });
        resolve_color_changes(&mut line);
        assert_eq!(line.changes.len(), 2);
        assert_eq!(line.changes[0].color_next, 2);
        assert!((line.changes[1].t - 0.5).abs() < 1e-9);
        assert_eq!(line.changes[1].color_next, 1);
    }

    #[test]
    fn test_filter_snaps_to_endpoints() {
        let mut line = ProjectionLine::new(Line::new(pt(0.0, 0.0), pt(10.0, 0.0)));
        line.changes = vec![
            ColorChange { t: 0.0005, color_next: 1 },
            ColorChange { t: 0.5, color_next: 2 },
            ColorChange { t: 0.9995, color_next: 3 },
        ];
        filter_color_changes(&mut line, scaled(0.01));
        assert_eq!(
            line.changes,
            vec![
                ColorChange { t: 0.0, color_next: 1 },
                ColorChange { t: 0.5, color_next: 2 },
                ColorChange { t: 1.0, color_next: 3 },
            ]
        );
    }

    #[test]
    fn test_filter_merges_repeated_colors() {
        let mut line = ProjectionLine::new(Line::new(pt(0.0, 0.0), pt(10.0, 0.0)));
        line.changes = vec![
            ColorChange { t: 0.2, color_next: 1 },
            ColorChange { t: 0.4, color_next: 1 },
            ColorChange { t: 0.6, color_next: 2 },
        ];
        filter_color_changes(&mut line, scaled(0.01));
        assert_eq!(line.changes.len(), 2);
        assert_eq!(line.changes[1].t, 0.6);
    }

    #[test]
    fn test_project_colors_onto_square() {
        let config = SegmentationConfig::default();
        let outline = square_mm(10.0);
        let painted = vec![painted_square(10.0, 0.05, [1, 1, 2, 2])];
        let loops = project_colors(&outline, &painted, &config);
        assert_eq!(loops.len(), 1);
        let lines = color_points_to_color_lines(&loops[0]);
        let length_of = |color: Color| -> f64 {
            lines
                .iter()
                .filter(|l| l.color == color)
                .map(|l| unscale(l.line.length().round() as Coord))
                .sum()
        };
        assert!((length_of(1) - 20.0).abs() < 0.2);
        assert!((length_of(2) - 20.0).abs() < 0.2);
    }

    #[test]
    fn test_unpainted_loop_defaults_to_zero() {
        let config = SegmentationConfig::default();
        let outline = square_mm(10.0);
        let far = vec![painted_square(2.0, 30.0, [1, 1, 1, 1])];
        let loops = project_colors(&outline, &far, &config);
        assert_eq!(loops.len(), 1);
        assert!(loops[0].iter().all(|cp| cp.color_prev == 0 && cp.color_next == 0));
    }

    #[test]
    fn test_bare_edges_inherit_previous_color() {
        let config = SegmentationConfig::default();
        let outline = square_mm(10.0);
        // Only the bottom and right sides have paint next to them.
        let painted = vec![vec![
            color_line(pt(0.0, -0.05), pt(10.0, -0.05), 1),
            color_line(pt(10.05, 0.0), pt(10.05, 10.0), 2),
        ]];
        let loops = project_colors(&outline, &painted, &config);
        assert_eq!(loops.len(), 1);

        let lines = color_points_to_color_lines(&loops[0]);
        let color_at = |x: f64, y: f64| -> Option<Color> {
            let p = pt(x, y);
            lines
                .iter()
                .find(|l| l.line.distance_to_point(&p) < scaled(1e-3))
                .map(|l| l.color)
        };
        assert_eq!(color_at(5.0, 0.0), Some(1));
        assert_eq!(color_at(10.0, 5.0), Some(2));
        // Top and left continue the color of the right side.
        assert_eq!(color_at(5.0, 10.0), Some(2));
        assert_eq!(color_at(0.0, 5.0), Some(2));
    }

    #[test]
    fn test_projection_is_deterministic() {
        let config = SegmentationConfig::default();
        let outline = square_mm(10.0);
        let painted = vec![painted_square(10.0, -0.1, [3, 1, 2, 1])];
        let first = project_colors(&outline, &painted, &config);
        let second = project_colors(&outline, &painted, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_prepare_outline_drops_specks() {
        let mut outline = square_mm(10.0);
        outline.push(Polygon::rectangle(pt(20.0, 0.0), pt(20.1, 0.1)).into());
        let prepared = prepare_outline(&outline, 0.1);
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].contour.len(), 4);
    }
}
