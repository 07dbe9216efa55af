//! Voronoi segmentation of colored outline loops.
//!
//! Every outline segment claims the part of the layer that is closer to it
//! than to any other segment. The Voronoi diagram of all segments is
//! annotated, pruned down to the edges that run from contour vertices into
//! the interior, and then every segment's cell is traced into a polygon of
//! the segment's color.

mod diagram;

pub use diagram::{ContourLayout, HalfEdge, VoronoiDiagram};

use super::color::{Color, ColoredLines};
use crate::clipper::union_ex;
use crate::geometry::{BoundingBox, ExPolygon, ExPolygons, Line, Point, PointF, Polygon};
use crate::scaled;
use log::{debug, warn};
use std::collections::VecDeque;
use std::f64::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tag {
    Normal,
    OnContour,
    Deleted,
}

/// Does the ray from the shared vertex of `first` and `second` towards
/// `p` point into the loop (interior on the left)?
fn points_inside(first: &Line, second: &Line, p: PointF) -> bool {
    let in_first = first.direction_f().normalize().perp();
    let in_second = second.direction_f().normalize().perp();
    let inward = (in_first + in_second).normalize();
    let dir = (p - first.b.to_f64()).normalize();
    inward.dot(&dir) > 0.0
}

struct Annotated<'a> {
    diagram: &'a VoronoiDiagram,
    vertex_tags: Vec<Tag>,
    edge_tags: Vec<Tag>,
}

impl<'a> Annotated<'a> {
    fn new(diagram: &'a VoronoiDiagram) -> Self {
        Self {
            diagram,
            vertex_tags: vec![Tag::Normal; diagram.num_vertices()],
            edge_tags: vec![Tag::Normal; diagram.num_edges()],
        }
    }

    fn non_deleted_edge_count(&self, v: usize) -> usize {
        self.diagram
            .outgoing(v)
            .iter()
            .filter(|&&e| self.edge_tags[e] != Tag::Deleted)
            .count()
    }

    fn can_be_deleted(&self, v: usize) -> bool {
        self.vertex_tags[v] == Tag::Normal && self.non_deleted_edge_count(v) <= 1
    }

    fn delete_edge_pair(&mut self, e: usize) {
        self.edge_tags[e] = Tag::Deleted;
        self.edge_tags[self.diagram.twin(e)] = Tag::Deleted;
    }

    /// Delete `v` with all its edges, then every neighbour left dangling.
    fn delete_vertex_deep(&mut self, v: usize) {
        let diagram = self.diagram;
        let mut queue = VecDeque::from([v]);
        while let Some(v) = queue.pop_front() {
            if self.vertex_tags[v] == Tag::Deleted {
                continue;
            }
            self.vertex_tags[v] = Tag::Deleted;
            for &e in diagram.outgoing(v) {
                self.delete_edge_pair(e);
                let to = diagram.edge(e).to;
                if self.can_be_deleted(to) {
                    queue.push_back(to);
                }
            }
        }
    }

    /// Length of the edge chain starting with `start` that continues almost
    /// straight through vertices of degree two.
    fn total_edge_length(&self, start: usize) -> f64 {
        let diagram = self.diagram;
        let max_turn = (PI / 12.0).cos();
        let mut total = diagram.edge_length(start);
        let mut prev = start;

        for _ in 0..diagram.num_edges() {
            let v = diagram.edge(prev).to;
            if self.non_deleted_edge_count(v) > 2 {
                break;
            }
            let prev_dir = diagram.edge_vector(prev).normalize();
            let back = diagram.twin(prev);
            let found = diagram.outgoing(v).iter().copied().find(|&e| {
                e != back
                    && self.edge_tags[e] != Tag::Deleted
                    && prev_dir.dot(&diagram.edge_vector(e).normalize()) > max_turn
            });
            match found {
                Some(e) if e != start => {
                    total += diagram.edge_length(e);
                    prev = e;
                }
                _ => break,
            }
        }
        total
    }

    /// Keep only the edge of `v` leading into the longest straight chain.
    fn remove_multiple_edges(&mut self, v: usize) {
        if self.non_deleted_edge_count(v) <= 1 {
            return;
        }
        let mut candidates: Vec<(usize, f64)> = self
            .diagram
            .outgoing(v)
            .iter()
            .copied()
            .filter(|&e| self.edge_tags[e] != Tag::Deleted)
            .map(|e| (e, self.total_edge_length(e)))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        for &(e, _) in &candidates[1..] {
            self.delete_edge_pair(e);
            let to = self.diagram.edge(e).to;
            if self.can_be_deleted(to) {
                self.delete_vertex_deep(to);
            }
        }
    }

    /// Walk the cell of the segment ending at `corner`, starting from `start`.
    /// Returns the polygon and the vertex the walk stopped at.
    fn trace_cell(&mut self, start: usize, corner_point: Point) -> (Polygon, Option<usize>) {
        let diagram = self.diagram;
        let mut points = vec![corner_point];
        let mut e = start;

        for _ in 0..=diagram.num_edges() {
            if self.edge_tags[e] == Tag::Deleted {
                e = diagram.rot_prev(e);
            } else {
                let to = diagram.edge(e).to;
                points.push(Point::from_f64(diagram.vertex(to)));
                self.edge_tags[e] = Tag::Deleted;
                if self.vertex_tags[to] != Tag::Normal {
                    return (Polygon::from_points(points), Some(to));
                }
                e = diagram.next(e);
            }
            if e == start {
                break;
            }
        }
        (Polygon::from_points(points), None)
    }
}

/// Split the area enclosed by `loops` into one set of regions per color.
///
/// `loops` are closed, counter-clockwise outer contours and clockwise holes.
/// The result is indexed by color and has `num_states` entries.
pub fn segment_colored_loops(loops: &[ColoredLines], num_states: usize, sample_spacing: f64) -> Vec<ExPolygons> {
    let mut result: Vec<ExPolygons> = vec![ExPolygons::new(); num_states];

    let mut lines: Vec<Line> = Vec::new();
    let mut colors: Vec<Color> = Vec::new();
    let mut prev: Vec<usize> = Vec::new();
    let mut next: Vec<usize> = Vec::new();
    for colored in loops.iter().filter(|l| l.len() >= 3) {
        let base = lines.len();
        let n = colored.len();
        for (i, cl) in colored.iter().enumerate() {
            lines.push(cl.line);
            colors.push(cl.color);
            prev.push(base + (i + n - 1) % n);
            next.push(base + (i + 1) % n);
        }
    }
    if lines.is_empty() {
        return result;
    }

    let layout = ContourLayout {
        lines: &lines,
        prev: &prev,
        next: &next,
    };
    let Some(diagram) = VoronoiDiagram::build(&layout, scaled(sample_spacing)) else {
        return result;
    };
    let mut annotated = Annotated::new(&diagram);

    // Contour vertices are never pruned.
    for s in 0..lines.len() {
        if let Some(v) = diagram.corner(s) {
            annotated.vertex_tags[v] = Tag::OnContour;
        }
    }

    // Anything outside the bounding box of the loops is outside the loops.
    let bbox = BoundingBox::from_points(&lines.iter().map(|l| l.a).collect::<Vec<_>>());
    for v in 0..diagram.num_vertices() {
        if annotated.vertex_tags[v] == Tag::Normal && !bbox.contains_f(&diagram.vertex(v)) {
            annotated.delete_vertex_deep(v);
        }
    }

    // Edges leaving a contour vertex towards the outside.
    for s in 0..lines.len() {
        let Some(v) = diagram.corner(s) else {
            continue;
        };
        for &e in diagram.outgoing(v) {
            if annotated.edge_tags[e] == Tag::Deleted {
                continue;
            }
            let to = diagram.edge(e).to;
            if !points_inside(&lines[s], &lines[next[s]], diagram.vertex(to)) {
                annotated.delete_edge_pair(e);
                if annotated.vertex_tags[to] == Tag::Normal {
                    annotated.delete_vertex_deep(to);
                }
            }
        }
    }

    for s in 0..lines.len() {
        if let Some(v) = diagram.corner(s) {
            annotated.remove_multiple_edges(v);
        }
    }

    let mut per_color: Vec<ExPolygons> = vec![ExPolygons::new(); num_states];
    let mut failed = 0usize;
    for s in 0..lines.len() {
        let (Some(corner), Some(end_corner), Some(start)) =
            (diagram.corner(s), diagram.corner(prev[s]), diagram.cell_start(s))
        else {
            continue;
        };
        if annotated.vertex_tags[corner] != Tag::OnContour {
            continue;
        }

        let (polygon, stopped_at) = annotated.trace_cell(start, lines[s].b);
        if stopped_at != Some(end_corner) {
            failed += 1;
            continue;
        }
        annotated.vertex_tags[corner] = Tag::Deleted;

        match per_color.get_mut(colors[s] as usize) {
            Some(target) if polygon.is_valid() => target.push(ExPolygon::from(polygon)),
            Some(_) => {}
            None => warn!("Segment color {} exceeds {} paint states", colors[s], num_states),
        }
    }
    if failed > 0 {
        debug!("{} of {} Voronoi cells could not be traced", failed, lines.len());
    }

    for (target, polygons) in result.iter_mut().zip(per_color) {
        if !polygons.is_empty() {
            *target = union_ex(&polygons);
        }
    }
    result
}
