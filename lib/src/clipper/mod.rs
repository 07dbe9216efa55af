//! Clipper polygon boolean operations module.
//!
//! This module provides polygon boolean operations (union, intersection, difference)
//! and offset operations using the geo-clipper library.
//!
//! These operations are used for:
//! - Cleaning the layer outline before color projection
//! - Merging Voronoi cells into per-color regions
//! - Top/bottom propagation (shrink, intersect, opening)
//! - Width trimming and the final non-overlapping merge
//!
//! Distances passed to the offset functions are in mm. Areas passed to the
//! filters are in mm².

use crate::geometry::{ExPolygon, ExPolygons, Point, Polygon};
use crate::{unscale, unscale_area, CoordF};
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};

/// Integer grid used by Clipper, per mm. Matches the crate's 1 nm resolution.
const CLIPPER_FACTOR: f64 = 1_000_000.0;

/// Join type for offset corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetJoinType {
    /// Square corners
    Square,
    /// Round corners
    Round,
    /// Mitered corners
    #[default]
    Miter,
}

impl From<OffsetJoinType> for JoinType {
    fn from(jt: OffsetJoinType) -> Self {
        match jt {
            OffsetJoinType::Square => JoinType::Square,
            OffsetJoinType::Round => JoinType::Round(0.005), // Arc tolerance in mm
            OffsetJoinType::Miter => JoinType::Miter(3.0),   // Miter limit
        }
    }
}

fn ring_to_geo(points: &[Point]) -> LineString<f64> {
    let mut ring: Vec<GeoCoord<f64>> = points
        .iter()
        .map(|p| GeoCoord {
            x: unscale(p.x),
            y: unscale(p.y),
        })
        .collect();

    // Close the ring if needed
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    LineString::new(ring)
}

/// Convert our Polygon to geo's Polygon type, oriented counter-clockwise.
fn polygon_to_geo(poly: &Polygon) -> GeoPolygon<f64> {
    let mut poly = poly.clone();
    poly.make_counter_clockwise();
    GeoPolygon::new(ring_to_geo(poly.points()), vec![])
}

/// Convert our ExPolygon to geo's Polygon type (with holes).
///
/// The contour is passed counter-clockwise and holes clockwise so the
/// non-zero fill rule treats holes as holes.
fn expolygon_to_geo(expoly: &ExPolygon) -> GeoPolygon<f64> {
    let mut expoly = expoly.clone();
    expoly.orient();
    let holes = expoly
        .holes
        .iter()
        .map(|hole| ring_to_geo(hole.points()))
        .collect();
    GeoPolygon::new(ring_to_geo(expoly.contour.points()), holes)
}

fn ring_from_geo(ring: &LineString<f64>) -> Polygon {
    let mut points: Vec<Point> = ring
        .coords()
        .map(|c| Point::new(crate::scale(c.x), crate::scale(c.y)))
        .collect();

    // Remove the closing point if present (our Polygon doesn't store it)
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Polygon::from_points(points)
}

/// Convert geo's Polygon to our ExPolygon type (with holes).
fn geo_to_expolygon(geo_poly: &GeoPolygon<f64>) -> ExPolygon {
    let contour = ring_from_geo(geo_poly.exterior());
    let holes: Vec<Polygon> = geo_poly
        .interiors()
        .iter()
        .map(ring_from_geo)
        .filter(|h| h.is_valid())
        .collect();

    let mut expoly = ExPolygon::with_holes(contour, holes);
    expoly.orient();
    expoly
}

/// Convert geo's MultiPolygon to our ExPolygons type.
fn geo_multi_to_expolygons(multi: &MultiPolygon<f64>) -> ExPolygons {
    multi
        .0
        .iter()
        .map(geo_to_expolygon)
        .filter(|ex| !ex.is_empty())
        .collect()
}

/// Convert our Polygons to geo's MultiPolygon.
fn polygons_to_geo_multi(polys: &[Polygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(
        polys
            .iter()
            .filter(|p| p.is_valid())
            .map(polygon_to_geo)
            .collect(),
    )
}

/// Convert our ExPolygons to geo's MultiPolygon.
fn expolygons_to_geo_multi(expolys: &[ExPolygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(
        expolys
            .iter()
            .filter(|ex| !ex.is_empty())
            .map(expolygon_to_geo)
            .collect(),
    )
}

// ============================================================================
// Boolean Operations
// ============================================================================

/// Compute the union of two sets of polygons.
pub fn union(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() {
        return union_ex(clip);
    }
    if clip.is_empty() {
        return union_ex(subject);
    }

    let subject_geo = expolygons_to_geo_multi(subject);
    let clip_geo = expolygons_to_geo_multi(clip);

    let result = subject_geo.union(&clip_geo, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// Compute the union of a single set of potentially overlapping polygons
/// (non-zero fill rule).
///
/// The set is split in two halves passed as subject and clip of a single
/// Clipper union; overlaps inside each half are resolved by the fill rule.
pub fn union_ex(polygons: &[ExPolygon]) -> ExPolygons {
    match polygons.len() {
        0 => vec![],
        1 => {
            // Self-union still cleans up self-intersections and orientation.
            let geo = expolygons_to_geo_multi(polygons);
            let empty = MultiPolygon::<f64>::new(vec![]);
            geo_multi_to_expolygons(&geo.union(&empty, CLIPPER_FACTOR))
        }
        n => {
            let (a, b) = polygons.split_at(n / 2);
            let result = expolygons_to_geo_multi(a).union(&expolygons_to_geo_multi(b), CLIPPER_FACTOR);
            geo_multi_to_expolygons(&result)
        }
    }
}

/// Union of raw polygon loops (each oriented counter-clockwise first).
pub fn union_polygons(polygons: &[Polygon]) -> ExPolygons {
    let valid: Vec<&Polygon> = polygons.iter().filter(|p| p.is_valid()).collect();
    match valid.len() {
        0 => vec![],
        n => {
            let (a, b) = valid.split_at(n / 2);
            let a: Vec<Polygon> = a.iter().map(|p| (*p).clone()).collect();
            let b: Vec<Polygon> = b.iter().map(|p| (*p).clone()).collect();
            let result = polygons_to_geo_multi(&a).union(&polygons_to_geo_multi(&b), CLIPPER_FACTOR);
            geo_multi_to_expolygons(&result)
        }
    }
}

/// Compute the intersection of two sets of polygons.
pub fn intersection(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() || clip.is_empty() {
        return vec![];
    }

    let subject_geo = expolygons_to_geo_multi(subject);
    let clip_geo = expolygons_to_geo_multi(clip);

    let result = subject_geo.intersection(&clip_geo, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// Compute the difference of two sets of polygons (subject - clip).
pub fn difference(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() {
        return vec![];
    }
    if clip.is_empty() {
        return subject.to_vec();
    }

    let subject_geo = expolygons_to_geo_multi(subject);
    let clip_geo = expolygons_to_geo_multi(clip);

    let result = subject_geo.difference(&clip_geo, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

// ============================================================================
// Offset Operations
// ============================================================================

/// Offset multiple ExPolygons by a given distance.
///
/// Positive delta inflates (grows) the polygons, negative delta deflates (shrinks) them.
///
/// # Arguments
/// * `expolygons` - The polygons to offset
/// * `delta` - The offset distance in mm (positive = grow, negative = shrink)
/// * `join_type` - The type of join to use at corners
pub fn offset_expolygons(
    expolygons: &[ExPolygon],
    delta: CoordF,
    join_type: OffsetJoinType,
) -> ExPolygons {
    if expolygons.is_empty() {
        return vec![];
    }

    let geo_multi = expolygons_to_geo_multi(expolygons);
    let jt = join_type.into();

    let result = geo_multi.offset(delta, jt, EndType::ClosedPolygon, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// Offset multiple Polygons by a given distance.
pub fn offset_polygons(
    polygons: &[Polygon],
    delta: CoordF,
    join_type: OffsetJoinType,
) -> ExPolygons {
    if polygons.is_empty() {
        return vec![];
    }

    let geo_multi = polygons_to_geo_multi(polygons);
    let jt = join_type.into();

    let result = geo_multi.offset(delta, jt, EndType::ClosedPolygon, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// Shrink (inset) ExPolygons by a given distance in mm.
pub fn shrink(expolygons: &[ExPolygon], distance: CoordF, join_type: OffsetJoinType) -> ExPolygons {
    offset_expolygons(expolygons, -distance.abs(), join_type)
}

/// Grow (outset) ExPolygons by a given distance in mm.
pub fn grow(expolygons: &[ExPolygon], distance: CoordF, join_type: OffsetJoinType) -> ExPolygons {
    offset_expolygons(expolygons, distance.abs(), join_type)
}

/// Morphological opening: shrink then grow by the same amount.
///
/// Removes features narrower than twice `distance`.
pub fn opening(
    expolygons: &[ExPolygon],
    distance: CoordF,
    join_type: OffsetJoinType,
) -> ExPolygons {
    if expolygons.is_empty() || distance <= 0.0 {
        return expolygons.to_vec();
    }
    let shrunk = shrink(expolygons, distance, join_type);
    grow(&shrunk, distance, join_type)
}

/// Offset2: offset by `delta1`, then by `delta2` (signed, mm).
pub fn offset2(
    expolygons: &[ExPolygon],
    delta1: CoordF,
    delta2: CoordF,
    join_type: OffsetJoinType,
) -> ExPolygons {
    if expolygons.is_empty() {
        return vec![];
    }
    let first = offset_expolygons(expolygons, delta1, join_type);
    if first.is_empty() {
        return vec![];
    }
    offset_expolygons(&first, delta2, join_type)
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Remove ExPolygons whose area is below `min_area` (mm²).
pub fn remove_small(expolygons: &[ExPolygon], min_area: CoordF) -> ExPolygons {
    expolygons
        .iter()
        .filter(|expoly| unscale_area(expoly.area()) >= min_area)
        .cloned()
        .collect()
}

/// Remove ExPolygons and holes whose area is below `min_area` (mm²).
pub fn remove_small_and_small_holes(expolygons: &mut ExPolygons, min_area: CoordF) {
    expolygons.retain(|ex| unscale_area(ex.contour.area()) >= min_area);
    for ex in expolygons.iter_mut() {
        ex.holes.retain(|h| unscale_area(h.area()) >= min_area);
    }
}

/// Compute the total area of a set of polygons in mm².
pub fn total_area_mm2(expolygons: &[ExPolygon]) -> CoordF {
    expolygons.iter().map(|p| unscale_area(p.area())).sum()
}
