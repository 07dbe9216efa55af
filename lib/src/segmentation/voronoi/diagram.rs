//! Segment Voronoi diagram as an index-addressed half-edge arena.
//!
//! Each outline segment is represented by point samples along its interior.
//! The point Voronoi diagram is the dual of the `spade` Delaunay
//! triangulation of those samples; edges between samples of the same segment
//! are dropped so every remaining edge separates two different segments.
//!
//! At a contour vertex shared by segments `s` and `next(s)`, the last sample
//! of `s` and the first sample of `next(s)` sit at the same distance from the
//! vertex. Their bisector therefore passes exactly through the vertex, and the
//! vertex is inserted into the diagram by splitting that edge.
//!
//! Half-edges are allocated in twin pairs, `twin(e) == e ^ 1`. The cell of a
//! half-edge (the segment whose region lies on its left) is stored on the
//! half-edge. Around every vertex the outgoing half-edges are kept sorted
//! counter-clockwise.

use crate::geometry::{Line, PointF};
use log::warn;
use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};
use std::collections::HashMap;

/// Voronoi vertices closer than this (scaled units) are merged.
const MERGE_DISTANCE: f64 = 10.0;

/// A contour vertex counts as lying on a Voronoi edge within this distance.
const ON_EDGE_TOLERANCE: f64 = 100.0;

/// Shorter segments are not sampled.
const MIN_SEGMENT_LENGTH: f64 = 1.0;

/// Lower bound of the first and last sample distance from a segment end.
const MIN_END_OFFSET: f64 = 0.25 * MIN_SEGMENT_LENGTH;

/// Sample gaps grow by this fraction of the distance to the nearer segment
/// end until they reach the sampling spacing.
const GRADING: f64 = 0.5;

#[derive(Clone, Copy, Debug)]
struct Site {
    position: Point2<f64>,
    sample: usize,
    segment: usize,
}

impl HasPosition for Site {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// A directed Voronoi edge. `segment` owns the cell on its left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalfEdge {
    pub from: usize,
    pub to: usize,
    pub segment: usize,
}

/// What a Delaunay pair of samples turned into.
#[derive(Clone, Copy, Debug)]
enum DualOf {
    /// Edge pair `2k`/`2k + 1`.
    Edge(usize),
    /// The edge collapsed into a single vertex.
    Vertex(usize),
}

/// Outline segments with their loop neighbours.
#[derive(Clone, Debug)]
pub struct ContourLayout<'a> {
    pub lines: &'a [Line],
    pub prev: &'a [usize],
    pub next: &'a [usize],
}

#[derive(Clone, Debug, Default)]
pub struct VoronoiDiagram {
    vertices: Vec<PointF>,
    edges: Vec<HalfEdge>,
    outgoing: Vec<Vec<usize>>,
    slot: Vec<usize>,
    /// Vertex at the end point of each segment, if it was inserted.
    corners: Vec<Option<usize>>,
}

/// Sample offsets along a segment of length `len`, first and last at the
/// given end offsets.
///
/// Near each end the gaps grow geometrically, so a segment next to much
/// shorter neighbours is sampled as densely as they are close to the shared
/// vertex. Every point of the segment then stays nearer to its own samples
/// than to samples of the neighbours. Away from the ends the gap is
/// `spacing`.
fn sample_offsets(len: f64, start_offset: f64, end_offset: f64, spacing: f64) -> Vec<f64> {
    let step_at = |d: f64| (GRADING * d).min(spacing);
    let mut head = vec![start_offset];
    let mut tail = vec![len - end_offset];
    loop {
        let (h, t) = (head[head.len() - 1], tail[tail.len() - 1]);
        let (step_head, step_tail) = (step_at(h), step_at(len - t));
        if t - h <= step_head + step_tail || (step_head >= spacing && step_tail >= spacing) {
            break;
        }
        if step_head < spacing {
            head.push(h + step_head);
        }
        if step_tail < spacing {
            tail.push(t - step_tail);
        }
    }

    let (h, t) = (head[head.len() - 1], tail[tail.len() - 1]);
    let step = step_at(h).max(step_at(len - t));
    let count = ((t - h) / step).ceil() as usize;
    head.extend((1..count).map(|k| h + (t - h) * k as f64 / count as f64));
    head.extend(tail.into_iter().rev());
    head
}

impl VoronoiDiagram {
    /// Build the diagram of the given outline segments, sampled every
    /// `spacing` (scaled units) or closer.
    ///
    /// Returns `None` when the samples cannot be triangulated.
    pub fn build(layout: &ContourLayout<'_>, spacing: f64) -> Option<Self> {
        let lines = layout.lines;
        let n = lines.len();
        let mut sites: Vec<Site> = Vec::new();
        let mut first_sample: Vec<Option<usize>> = vec![None; n];
        let mut last_sample: Vec<Option<usize>> = vec![None; n];

        for (s, line) in lines.iter().enumerate() {
            let len = line.length();
            if len < MIN_SEGMENT_LENGTH {
                continue;
            }
            let dir = line.direction_f() * (1.0 / len);
            let end_offset_to = |other: &Line| (0.25 * other.length().min(len).min(spacing)).max(MIN_END_OFFSET);
            let offsets = sample_offsets(
                len,
                end_offset_to(&lines[layout.prev[s]]),
                end_offset_to(&lines[layout.next[s]]),
                spacing,
            );
            let a = line.a.to_f64();

            first_sample[s] = Some(sites.len());
            for offset in offsets {
                let p = a + dir * offset;
                sites.push(Site {
                    position: Point2::new(p.x, p.y),
                    sample: sites.len(),
                    segment: s,
                });
            }
            last_sample[s] = Some(sites.len() - 1);
        }

        let (mut min, mut max) = (
            PointF::new(f64::MAX, f64::MAX),
            PointF::new(f64::MIN, f64::MIN),
        );
        for site in &sites {
            min = PointF::new(min.x.min(site.position.x), min.y.min(site.position.y));
            max = PointF::new(max.x.max(site.position.x), max.y.max(site.position.y));
        }
        let center = (min + max) * 0.5;
        let far_distance = 4.0 * (max - min).length() + 1.0e6;

        let triangulation: DelaunayTriangulation<Site> = match DelaunayTriangulation::bulk_load(sites) {
            Ok(t) => t,
            Err(err) => {
                warn!("Delaunay triangulation of {} outline segments failed: {:?}", n, err);
                return None;
            }
        };

        // Circumcenters of the inner faces are the Voronoi vertices.
        let mut raw_vertices: Vec<PointF> = Vec::with_capacity(triangulation.num_inner_faces());
        let mut face_vertex = vec![usize::MAX; triangulation.num_all_faces()];
        for face in triangulation.inner_faces() {
            let [v0, v1, v2] = face.vertices().map(|v| to_pointf(v.position()));
            face_vertex[face.fix().index()] = raw_vertices.len();
            raw_vertices.push(circumcenter(v0, v1, v2));
        }

        struct RawEdge {
            u: usize,
            w: usize,
            left: usize,
            right: usize,
            key: (usize, usize),
        }

        let mut raw_edges: Vec<RawEdge> = Vec::new();
        for edge in triangulation.directed_edges() {
            let (from, to) = (edge.from(), edge.to());
            if from.fix().index() > to.fix().index() {
                continue;
            }
            let (p, q) = (*from.data(), *to.data());
            let d = to_pointf(q.position) - to_pointf(p.position);
            let left = edge.face().as_inner().map(|f| face_vertex[f.fix().index()]);
            let right = edge.rev().face().as_inner().map(|f| face_vertex[f.fix().index()]);

            let mut far_vertex = |origin: usize, dir: PointF| {
                let c = raw_vertices[origin];
                let reach = far_distance + c.distance(&center);
                raw_vertices.push(c + dir.normalize() * reach);
                raw_vertices.len() - 1
            };
            // Half-edge with p's cell on its left runs from c(right) to c(left).
            let (u, w) = match (right, left) {
                (Some(r), Some(l)) => (r, l),
                (None, Some(l)) => (far_vertex(l, PointF::new(d.y, -d.x)), l),
                (Some(r), None) => (r, far_vertex(r, d.perp())),
                (None, None) => continue,
            };
            raw_edges.push(RawEdge {
                u,
                w,
                left: p.segment,
                right: q.segment,
                key: ordered(p.sample, q.sample),
            });
        }

        // Merge coincident circumcenters (cocircular samples).
        let mut parent: Vec<usize> = (0..raw_vertices.len()).collect();
        for e in &raw_edges {
            if raw_vertices[e.u].distance(&raw_vertices[e.w]) < MERGE_DISTANCE {
                let (ru, rw) = (find(&mut parent, e.u), find(&mut parent, e.w));
                if ru != rw {
                    parent[ru.max(rw)] = ru.min(rw);
                }
            }
        }

        let mut diagram = VoronoiDiagram {
            corners: vec![None; n],
            ..Default::default()
        };
        let mut compact = vec![usize::MAX; raw_vertices.len()];
        let mut vertex_id = |diagram: &mut VoronoiDiagram, parent: &mut Vec<usize>, raw: usize| {
            let root = find(parent, raw);
            if compact[root] == usize::MAX {
                compact[root] = diagram.vertices.len();
                diagram.vertices.push(raw_vertices[root]);
            }
            compact[root]
        };

        let mut duals: HashMap<(usize, usize), DualOf> = HashMap::with_capacity(raw_edges.len());
        for e in &raw_edges {
            if find(&mut parent, e.u) == find(&mut parent, e.w) {
                duals.insert(e.key, DualOf::Vertex(e.u));
                continue;
            }
            if e.left == e.right {
                continue;
            }
            let u = vertex_id(&mut diagram, &mut parent, e.u);
            let w = vertex_id(&mut diagram, &mut parent, e.w);
            duals.insert(e.key, DualOf::Edge(diagram.edges.len() / 2));
            diagram.edges.push(HalfEdge {
                from: u,
                to: w,
                segment: e.left,
            });
            diagram.edges.push(HalfEdge {
                from: w,
                to: u,
                segment: e.right,
            });
        }

        // Insert the contour vertices.
        let mut missing = 0usize;
        for s in 0..n {
            let t = layout.next[s];
            let (Some(end), Some(start)) = (last_sample[s], first_sample[t]) else {
                missing += 1;
                continue;
            };
            let corner = lines[s].b.to_f64();
            let vertex = match duals.get(&ordered(end, start)) {
                Some(DualOf::Edge(k)) => diagram.insert_on_edge(*k, corner),
                Some(DualOf::Vertex(raw)) => {
                    let v = vertex_id(&mut diagram, &mut parent, *raw);
                    if diagram.vertices[v].distance(&corner) < ON_EDGE_TOLERANCE {
                        diagram.vertices[v] = corner;
                        Some(v)
                    } else {
                        None
                    }
                }
                None => None,
            };
            match vertex {
                Some(v) => diagram.corners[s] = Some(v),
                None => missing += 1,
            }
        }
        if missing > 0 {
            warn!("{} of {} contour vertices could not be inserted into the Voronoi diagram", missing, n);
        }

        diagram.sort_outgoing();
        Some(diagram)
    }

    /// Put `p` on edge pair `k`, splitting it unless `p` coincides with an
    /// end. Returns the vertex at `p`, or `None` when `p` is not on the edge.
    fn insert_on_edge(&mut self, k: usize, p: PointF) -> Option<usize> {
        let (e, t) = (2 * k, 2 * k + 1);
        let (u, w) = (self.edges[e].from, self.edges[e].to);
        let (pu, pw) = (self.vertices[u], self.vertices[w]);

        if pu.distance(&p) < MERGE_DISTANCE {
            self.vertices[u] = p;
            return Some(u);
        }
        if pw.distance(&p) < MERGE_DISTANCE {
            self.vertices[w] = p;
            return Some(w);
        }

        let dir = pw - pu;
        let len_sq = dir.length_squared();
        let param = (p - pu).dot(&dir) / len_sq;
        let off_line = (p - pu).cross(&dir).abs() / len_sq.sqrt();
        if !(0.0..=1.0).contains(&param) || off_line > ON_EDGE_TOLERANCE {
            return None;
        }

        let v = self.vertices.len();
        self.vertices.push(p);
        let (left, right) = (self.edges[e].segment, self.edges[t].segment);
        self.edges[e].to = v;
        self.edges[t].from = v;
        self.edges.push(HalfEdge {
            from: v,
            to: w,
            segment: left,
        });
        self.edges.push(HalfEdge {
            from: w,
            to: v,
            segment: right,
        });
        Some(v)
    }

    fn sort_outgoing(&mut self) {
        self.outgoing = vec![Vec::new(); self.vertices.len()];
        for (e, he) in self.edges.iter().enumerate() {
            self.outgoing[he.from].push(e);
        }
        let angle = |e: usize| {
            let d = self.vertices[self.edges[e].to] - self.vertices[self.edges[e].from];
            d.y.atan2(d.x)
        };
        self.slot = vec![0; self.edges.len()];
        for list in &mut self.outgoing {
            list.sort_by(|&a, &b| angle(a).total_cmp(&angle(b)));
            for (i, &e) in list.iter().enumerate() {
                self.slot[e] = i;
            }
        }
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn vertex(&self, v: usize) -> PointF {
        self.vertices[v]
    }

    #[inline]
    pub fn edge(&self, e: usize) -> &HalfEdge {
        &self.edges[e]
    }

    #[inline]
    pub fn twin(&self, e: usize) -> usize {
        e ^ 1
    }

    /// Outgoing half-edges of `v`, counter-clockwise.
    #[inline]
    pub fn outgoing(&self, v: usize) -> &[usize] {
        &self.outgoing[v]
    }

    /// Next outgoing half-edge counter-clockwise around the origin of `e`.
    pub fn rot_next(&self, e: usize) -> usize {
        let list = &self.outgoing[self.edges[e].from];
        list[(self.slot[e] + 1) % list.len()]
    }

    /// Next outgoing half-edge clockwise around the origin of `e`.
    pub fn rot_prev(&self, e: usize) -> usize {
        let list = &self.outgoing[self.edges[e].from];
        list[(self.slot[e] + list.len() - 1) % list.len()]
    }

    /// Next half-edge around the cell on the left of `e`.
    #[inline]
    pub fn next(&self, e: usize) -> usize {
        self.rot_prev(self.twin(e))
    }

    /// Vertex at the end point of segment `s`.
    #[inline]
    pub fn corner(&self, s: usize) -> Option<usize> {
        self.corners[s]
    }

    /// Half-edge leaving the end point of `s` with the cell of `s` on its left.
    pub fn cell_start(&self, s: usize) -> Option<usize> {
        let v = self.corners[s]?;
        self.outgoing[v].iter().copied().find(|&e| self.edges[e].segment == s)
    }

    pub fn edge_vector(&self, e: usize) -> PointF {
        self.vertices[self.edges[e].to] - self.vertices[self.edges[e].from]
    }

    pub fn edge_length(&self, e: usize) -> f64 {
        self.edge_vector(e).length()
    }
}

#[inline]
fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

#[inline]
fn to_pointf(p: Point2<f64>) -> PointF {
    PointF::new(p.x, p.y)
}

fn circumcenter(a: PointF, b: PointF, c: PointF) -> PointF {
    let ab = b - a;
    let ac = c - a;
    let d = 2.0 * ab.cross(&ac);
    if d == 0.0 {
        return PointF::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0);
    }
    let ab_sq = ab.length_squared();
    let ac_sq = ac.length_squared();
    a + PointF::new(
        (ac.y * ab_sq - ab.y * ac_sq) / d,
        (ab.x * ac_sq - ac.x * ab_sq) / d,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::scaled;

    fn square_layout(size: f64) -> (Vec<Line>, Vec<usize>, Vec<usize>) {
        let p = [
            Point::new_scale(0.0, 0.0),
            Point::new_scale(size, 0.0),
            Point::new_scale(size, size),
            Point::new_scale(0.0, size),
        ];
        let lines = (0..4).map(|i| Line::new(p[i], p[(i + 1) % 4])).collect();
        (lines, vec![3, 0, 1, 2], vec![1, 2, 3, 0])
    }

    #[test]
    fn test_circumcenter() {
        let c = circumcenter(PointF::new(0.0, 0.0), PointF::new(2.0, 0.0), PointF::new(0.0, 2.0));
        assert!((c.x - 1.0).abs() < 1e-12 && (c.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_samples_densify_towards_short_neighbours() {
        let spacing = scaled(0.2);
        let (len, end) = (scaled(5.0), scaled(0.25 * 0.05));
        let offsets = sample_offsets(len, end, end, spacing);

        assert_eq!(offsets[0], end);
        assert!((offsets[offsets.len() - 1] - (len - end)).abs() < 1e-6);
        assert!((offsets[1] - offsets[0] - GRADING * end).abs() < 1e-6);
        for pair in offsets.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap > 0.0 && gap <= spacing + 1e-6, "gap {}", gap);
        }
        // Symmetric about the middle, so both corner bisectors stay exact.
        for (x, y) in offsets.iter().zip(offsets.iter().rev()) {
            assert!((x + y - len).abs() < 1e-3);
        }
    }

    #[test]
    fn test_short_segment_samples() {
        let offsets = sample_offsets(4.0, 1.0, 1.0, 100.0);
        assert_eq!(offsets, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
    }

    #[test]
    fn test_square_corners_are_inserted() {
        let (lines, prev, next) = square_layout(4.0);
        let layout = ContourLayout {
            lines: &lines,
            prev: &prev,
            next: &next,
        };
        let diagram = VoronoiDiagram::build(&layout, scaled(0.2)).expect("diagram");
        for s in 0..4 {
            let v = diagram.corner(s).expect("corner inserted");
            assert_eq!(diagram.vertex(v), lines[s].b.to_f64());
            let start = diagram.cell_start(s).expect("cell start");
            // The cell of s leaves its end point towards the inside of the square.
            let dir = diagram.edge_vector(start);
            assert!(lines[s].direction_f().perp().dot(&dir) > 0.0);
        }
    }

    #[test]
    fn test_half_edge_structure_is_consistent() {
        let (lines, prev, next) = square_layout(3.0);
        let layout = ContourLayout {
            lines: &lines,
            prev: &prev,
            next: &next,
        };
        let diagram = VoronoiDiagram::build(&layout, scaled(0.5)).expect("diagram");
        for e in 0..diagram.num_edges() {
            let t = diagram.twin(e);
            assert_eq!(diagram.edge(e).from, diagram.edge(t).to);
            assert_ne!(diagram.edge(e).segment, diagram.edge(t).segment);
            assert_eq!(diagram.rot_prev(diagram.rot_next(e)), e);
        }
    }
}
