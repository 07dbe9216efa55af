//! Mesh slicing.
//!
//! Three flavours of the triangle/plane intersection are needed:
//! 1. plain outlines of a mesh at the layer heights,
//! 2. colored loops where every edge remembers the color of the triangle it
//!    was cut from,
//! 3. slab projections of up-facing (top) and down-facing (bottom) triangle
//!    parts between consecutive layer heights.
//!
//! Intersection segments are oriented so that the solid lies on their left,
//! which makes outer contours counter-clockwise and holes clockwise after
//! chaining.

use super::TriangleMesh;
use crate::clipper::{union_ex, union_polygons};
use crate::geometry::{ExPolygon, ExPolygons, Point, Point3F, Polygon, Polygons};
use crate::segmentation::color::{ColorPolygon, ColorPolygons};
use crate::segmentation::Color;
use crate::{Coord, CoordF};
use log::trace;
use std::collections::HashMap;

/// Endpoints closer than this (scaled units) are chained when no exact match exists.
const CHAIN_TOLERANCE: Coord = 10;

#[derive(Clone, Copy, Debug)]
struct SliceSegment {
    a: Point,
    b: Point,
    color: Color,
}

/// Point where the edge `(i, j)` crosses the plane `z`.
///
/// The interpolation always runs from the lower to the higher vertex index,
/// so both triangles sharing the edge produce the identical point.
fn edge_crossing(mesh: &TriangleMesh, i: u32, j: u32, z: CoordF) -> Point {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    let p = mesh.vertices[i as usize];
    let q = mesh.vertices[j as usize];
    let t = (z - p.z) / (q.z - p.z);
    p.lerp(&q, t).to_point_xy()
}

/// Cut one triangle with the plane `z`.
fn slice_triangle(mesh: &TriangleMesh, tri: usize, z: CoordF) -> Option<(Point, Point)> {
    let idx = mesh.indices[tri];
    let v = mesh.triangle_vertices(tri);
    let above = v.map(|p| p.z >= z);
    let num_above = above.iter().filter(|&&a| a).count();
    if num_above == 0 || num_above == 3 {
        return None;
    }

    let crossings: Vec<Point> = (0..3)
        .filter(|&k| above[k] != above[(k + 1) % 3])
        .map(|k| edge_crossing(mesh, idx[k], idx[(k + 1) % 3], z))
        .collect();
    let (a, b) = (crossings[0], crossings[1]);
    if a == b {
        return None;
    }

    let n = mesh.face_normal(tri);
    let d = b - a;
    // Solid on the left of the segment.
    if (d.x as CoordF) * -n.y + (d.y as CoordF) * n.x > 0.0 {
        Some((a, b))
    } else {
        Some((b, a))
    }
}

fn slice_segments(mesh: &TriangleMesh, colors: Option<&[Color]>, zs: &[CoordF]) -> Vec<Vec<SliceSegment>> {
    let mut layers: Vec<Vec<SliceSegment>> = vec![Vec::new(); zs.len()];
    for tri in 0..mesh.triangle_count() {
        let v = mesh.triangle_vertices(tri);
        let min_z = v[0].z.min(v[1].z).min(v[2].z);
        let max_z = v[0].z.max(v[1].z).max(v[2].z);
        if max_z - min_z <= 0.0 {
            continue;
        }

        let first = zs.partition_point(|&z| z < min_z);
        let last = zs.partition_point(|&z| z <= max_z);
        let color = colors.and_then(|c| c.get(tri).copied()).unwrap_or(0);
        for (layer, &z) in zs.iter().enumerate().take(last).skip(first) {
            if let Some((a, b)) = slice_triangle(mesh, tri, z) {
                layers[layer].push(SliceSegment { a, b, color });
            }
        }
    }
    layers
}

/// Chain segments into closed loops: exact endpoint match first, then the
/// closest start within [`CHAIN_TOLERANCE`].
fn chain_segments(segments: &[SliceSegment]) -> Vec<(Vec<Point>, Vec<Color>)> {
    let mut by_start: HashMap<Point, Vec<usize>> = HashMap::with_capacity(segments.len());
    for (idx, seg) in segments.iter().enumerate() {
        by_start.entry(seg.a).or_default().push(idx);
    }
    let mut used = vec![false; segments.len()];
    let mut loops = Vec::new();
    let mut broken = 0usize;

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut points = Vec::new();
        let mut colors = Vec::new();
        let mut current = start;

        let closed = loop {
            let seg = &segments[current];
            points.push(seg.a);
            colors.push(seg.color);

            if seg.b == segments[start].a && points.len() > 2 {
                break true;
            }
            let exact = by_start
                .get(&seg.b)
                .and_then(|candidates| candidates.iter().copied().find(|&i| !used[i]));
            let next = exact.or_else(|| {
                segments
                    .iter()
                    .enumerate()
                    .filter(|&(i, s)| !used[i] && s.a.coincides_with(&seg.b, CHAIN_TOLERANCE))
                    .min_by_key(|&(_, s)| s.a.distance_squared(&seg.b))
                    .map(|(i, _)| i)
            });
            match next {
                Some(i) => {
                    used[i] = true;
                    current = i;
                }
                None => {
                    break seg.b.coincides_with(&segments[start].a, CHAIN_TOLERANCE) && points.len() > 2;
                }
            }
        };

        if closed {
            loops.push((points, colors));
        } else {
            broken += 1;
        }
    }
    if broken > 0 {
        trace!("{} open slice chains dropped", broken);
    }
    loops
}

/// Group counter-clockwise contours and clockwise holes into ExPolygons.
fn make_expolygons(loops: Polygons) -> ExPolygons {
    let mut contours: Vec<Polygon> = Vec::new();
    let mut holes: Vec<Polygon> = Vec::new();
    for poly in loops.into_iter().filter(|p| p.is_valid()) {
        let area = poly.signed_area();
        if area > 0.0 {
            contours.push(poly);
        } else if area < 0.0 {
            holes.push(poly);
        }
    }
    contours.sort_by(|a, b| a.area().total_cmp(&b.area()));

    let mut expolygons: ExPolygons = contours.into_iter().map(ExPolygon::new).collect();
    for hole in holes {
        // Smallest contour containing the hole.
        if let Some(owner) = expolygons
            .iter_mut()
            .find(|ex| hole.points().iter().all(|p| ex.contour.contains_point(p)))
        {
            owner.add_hole(hole);
        }
    }
    union_ex(&expolygons)
}

/// Outlines of `mesh` at every height in `zs` (mm, ascending).
pub fn slice_outlines(mesh: &TriangleMesh, zs: &[CoordF]) -> Vec<ExPolygons> {
    slice_segments(mesh, None, zs)
        .iter()
        .map(|segments| {
            let loops = chain_segments(segments)
                .into_iter()
                .map(|(points, _)| Polygon::from_points(points))
                .collect();
            make_expolygons(loops)
        })
        .collect()
}

/// Colored loops of `mesh` at every height in `zs`; `colors` holds one color per face.
pub fn slice_colored(mesh: &TriangleMesh, colors: &[Color], zs: &[CoordF]) -> Vec<ColorPolygons> {
    slice_segments(mesh, Some(colors), zs)
        .iter()
        .map(|segments| {
            chain_segments(segments)
                .into_iter()
                .map(|(points, colors)| ColorPolygon::new(points, colors))
                .collect()
        })
        .collect()
}

/// Up- and down-facing surfaces of a mesh assigned to layers.
#[derive(Clone, Debug, Default)]
pub struct Slabs {
    /// Per layer: projection of up-facing parts with `zs[i] <= z < zs[i + 1]`.
    pub top: Vec<ExPolygons>,
    /// Per layer: projection of down-facing parts with `zs[i - 1] < z <= zs[i]`.
    pub bottom: Vec<ExPolygons>,
}

/// Keep the part of a convex 3D polygon on one side of a horizontal plane.
fn clip_by_z(polygon: &[Point3F], z: CoordF, keep: impl Fn(CoordF) -> bool) -> Vec<Point3F> {
    let n = polygon.len();
    let mut out = Vec::with_capacity(n + 1);
    for i in 0..n {
        let p = polygon[i];
        let q = polygon[(i + 1) % n];
        let (p_in, q_in) = (keep(p.z), keep(q.z));
        if p_in {
            out.push(p);
        }
        if p_in != q_in && p.z != q.z {
            out.push(p.lerp(&q, (z - p.z) / (q.z - p.z)));
        }
    }
    out
}

/// Project the up-facing and down-facing triangles of `mesh` whose faces
/// have color `color` onto the layers at heights `zs`.
///
/// Top parts below `zs[0]` and bottom parts above the last height are
/// ignored; bottom parts below `zs[0]` belong to the first layer and top
/// parts above the last height to the last layer.
pub fn slice_slabs(mesh: &TriangleMesh, colors: &[Color], color: Color, zs: &[CoordF]) -> Slabs {
    let num_layers = zs.len();
    let mut top: Vec<Polygons> = vec![Vec::new(); num_layers];
    let mut bottom: Vec<Polygons> = vec![Vec::new(); num_layers];
    if num_layers == 0 {
        return Slabs::default();
    }

    for tri in 0..mesh.triangle_count() {
        if colors.get(tri).copied().unwrap_or(0) != color {
            continue;
        }
        let normal_z = mesh.face_normal(tri).z;
        if normal_z == 0.0 {
            continue;
        }
        let v = mesh.triangle_vertices(tri);
        let min_z = v[0].z.min(v[1].z).min(v[2].z);
        let max_z = v[0].z.max(v[1].z).max(v[2].z);

        if normal_z > 0.0 {
            // Layer i takes [zs[i], zs[i + 1]).
            let first = zs.partition_point(|&z| z <= min_z).saturating_sub(1);
            for layer in first..num_layers {
                let lo = zs[layer];
                if lo > max_z {
                    break;
                }
                let mut part = clip_by_z(&v, lo, |z| z >= lo);
                if let Some(&hi) = zs.get(layer + 1) {
                    part = clip_by_z(&part, hi, |z| z < hi);
                }
                push_projection(&mut top[layer], &part);
            }
        } else {
            // Layer i takes (zs[i - 1], zs[i]].
            let first = zs.partition_point(|&z| z < min_z);
            for layer in first..num_layers {
                let hi = zs[layer];
                let mut part = clip_by_z(&v, hi, |z| z <= hi);
                if layer > 0 {
                    let lo = zs[layer - 1];
                    if lo >= max_z {
                        break;
                    }
                    part = clip_by_z(&part, lo, |z| z > lo);
                }
                push_projection(&mut bottom[layer], &part);
            }
        }
    }

    Slabs {
        top: top.iter().map(|p| union_polygons(p)).collect(),
        bottom: bottom.iter().map(|p| union_polygons(p)).collect(),
    }
}

fn push_projection(target: &mut Polygons, part: &[Point3F]) {
    if part.len() < 3 {
        return;
    }
    let mut polygon = Polygon::from_points(part.iter().map(Point3F::to_point_xy).collect());
    polygon.remove_duplicate_points(0);
    if polygon.is_valid() && polygon.area() > 0.0 {
        target.push(polygon);
    }
}
