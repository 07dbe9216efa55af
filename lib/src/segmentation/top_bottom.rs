//! Top/Bottom Resolver.
//!
//! Painted up-facing and down-facing triangles are projected into per-layer
//! slabs. Every exposed top patch is then pushed down through the solid top
//! layers of its region and every bottom patch up through the solid bottom
//! layers, shrinking by one perimeter width per layer so the patch stays
//! inside the walls of the layers it is propagated into.

use super::cancel::CancelToken;
use super::color::Color;
use crate::clipper::{
    difference, intersection, offset_expolygons, opening, remove_small, union, union_ex, OffsetJoinType,
};
use crate::geometry::ExPolygons;
use crate::mesh::slicer::slice_slabs;
use crate::mesh::TriangleMesh;
use crate::slice::Layer;
use crate::{CoordF, Result};
use log::{debug, trace};
use rayon::prelude::*;
use std::f64::consts::PI;

/// Smallest printable raw top/bottom patch (mm²).
const MIN_SURFACE_AREA: CoordF = 0.1;

/// Region settings of one color at one layer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayerColorStat {
    /// Widest perimeter extrusion (mm).
    pub extrusion_width: CoordF,
    /// Opening radius removing regions too thin to print (mm).
    pub small_region_threshold: CoordF,
    pub top_solid_layers: usize,
    pub bottom_solid_layers: usize,
}

impl LayerColorStat {
    /// Statistics over the regions of `layer` printing their perimeters with
    /// `color`. Color 0 and colors no region uses look at every region.
    pub fn new(layer: &Layer, color: Color) -> Self {
        let matching = |c: Color| {
            layer
                .regions
                .iter()
                .filter(move |r| c == 0 || r.config.perimeter_extruder == c as usize)
        };
        let use_all = matching(color).next().is_none();

        let mut stat = Self::default();
        for region in matching(if use_all { 0 } else { color }) {
            let config = &region.config;
            let width = config.perimeter_extrusion_width;
            stat.extrusion_width = stat.extrusion_width.max(width);
            stat.top_solid_layers = stat.top_solid_layers.max(config.top_solid_layers);
            stat.bottom_solid_layers = stat.bottom_solid_layers.max(config.bottom_solid_layers);
            let threshold = if config.gap_fill_active() {
                0.5 * width
            } else {
                width + 0.7 * rounded_rectangle_spacing(width, layer.height)
            };
            stat.small_region_threshold = 0.5 * threshold;
        }
        stat
    }
}

/// Spacing of neighbouring extrusions with a rounded rectangle cross section.
#[inline]
fn rounded_rectangle_spacing(width: CoordF, height: CoordF) -> CoordF {
    width - height * (1.0 - 0.25 * PI)
}

/// Raw painted top and bottom surfaces, indexed `[color][layer]`.
///
/// A color without any painted face has an empty vector instead of one
/// entry per layer.
#[derive(Clone, Debug, Default)]
pub struct RawSurfaces {
    pub top: Vec<Vec<ExPolygons>>,
    pub bottom: Vec<Vec<ExPolygons>>,
}

impl RawSurfaces {
    /// Project the painted triangles of `volumes` into top and bottom slabs
    /// of the layers sliced at `zs`.
    ///
    /// Tiny patches are dropped, and so is every part of a top (bottom)
    /// patch that is covered by the outline of the layer above (below).
    /// Volumes sinking below the bed get no extra bottom slab at z = 0.
    pub fn collect(
        volumes: &[(&TriangleMesh, Vec<Color>)],
        zs: &[CoordF],
        outlines: &[ExPolygons],
        num_states: usize,
    ) -> Self {
        let num_layers = zs.len();
        let mut raw = Self {
            top: vec![Vec::new(); num_states],
            bottom: vec![Vec::new(); num_states],
        };

        for (mesh, colors) in volumes {
            for color in 0..num_states {
                let c = color as Color;
                if !colors.contains(&c) {
                    continue;
                }
                let slabs = slice_slabs(mesh, colors, c, zs);
                append_layers(&mut raw.top[color], slabs.top, num_layers);
                append_layers(&mut raw.bottom[color], slabs.bottom, num_layers);
            }
        }

        for per_layer in raw.top.iter_mut().chain(raw.bottom.iter_mut()) {
            for surface in per_layer.iter_mut().filter(|s| !s.is_empty()) {
                *surface = remove_small(&union_ex(surface), MIN_SURFACE_AREA);
            }
        }

        for per_layer in raw.top.iter_mut() {
            for (layer_idx, surface) in per_layer.iter_mut().enumerate() {
                if !surface.is_empty() && layer_idx + 1 < num_layers {
                    *surface = difference(surface, &outlines[layer_idx + 1]);
                }
            }
        }
        for per_layer in raw.bottom.iter_mut() {
            for (layer_idx, surface) in per_layer.iter_mut().enumerate() {
                if !surface.is_empty() && layer_idx > 0 {
                    *surface = difference(surface, &outlines[layer_idx - 1]);
                }
            }
        }
        raw
    }

    fn is_empty(&self) -> bool {
        self.top.iter().chain(self.bottom.iter()).all(|per_layer| per_layer.iter().all(|s| s.is_empty()))
    }
}

fn append_layers(dst: &mut Vec<ExPolygons>, src: Vec<ExPolygons>, num_layers: usize) {
    if src.iter().all(|s| s.is_empty()) {
        return;
    }
    if dst.is_empty() {
        dst.resize(num_layers, ExPolygons::new());
    }
    for (d, s) in dst.iter_mut().zip(src) {
        d.extend(s);
    }
}

/// Remove every color's raw surface at `layer_idx` from `region`.
fn trim_by_raw(mut region: ExPolygons, layer_idx: usize, raw: &[Vec<ExPolygons>]) -> ExPolygons {
    for per_layer in raw {
        match per_layer.get(layer_idx) {
            Some(surface) if !surface.is_empty() && !region.is_empty() => region = difference(&region, surface),
            _ => {}
        }
    }
    region
}

struct Contribution {
    layer_idx: usize,
    color: usize,
    region: ExPolygons,
}

#[derive(Clone, Copy)]
enum Direction {
    Down,
    Up,
}

/// Patch of `color` at `layer_idx` and its propagation into the solid layers
/// below (tops) or above (bottoms).
#[allow(clippy::too_many_arguments)]
fn propagate(
    patch: &ExPolygons,
    layer_idx: usize,
    color: usize,
    direction: Direction,
    stat: &LayerColorStat,
    outlines: &[ExPolygons],
    opposite_raw: &[Vec<ExPolygons>],
    out: &mut Vec<Contribution>,
) {
    let mut patch = union_ex(patch);
    if stat.small_region_threshold > 0.0 {
        patch = opening(&patch, stat.small_region_threshold, OffsetJoinType::Miter);
    }
    if patch.is_empty() {
        return;
    }

    // The patch layer counts as the first solid layer.
    let targets: Vec<usize> = match direction {
        Direction::Down => {
            let lowest = layer_idx.saturating_sub(stat.top_solid_layers.saturating_sub(1));
            (lowest..layer_idx).rev().collect()
        }
        Direction::Up => {
            let highest = (layer_idx + stat.bottom_solid_layers.saturating_sub(1)).min(outlines.len() - 1);
            (layer_idx + 1..=highest).collect()
        }
    };

    let mut offset = 0.0;
    let mut trimmed = outlines[layer_idx].clone();
    for target in targets {
        offset -= stat.extrusion_width;
        trimmed = intersection(&trimmed, &outlines[target]);
        let mut region = intersection(&patch, &offset_expolygons(&trimmed, offset, OffsetJoinType::Miter));
        region = trim_by_raw(region, target, opposite_raw);
        if stat.small_region_threshold > 0.0 {
            region = opening(&region, stat.small_region_threshold, OffsetJoinType::Miter);
        }
        if region.is_empty() {
            break;
        }
        out.push(Contribution {
            layer_idx: target,
            color,
            region,
        });
    }

    out.push(Contribution {
        layer_idx,
        color,
        region: patch,
    });
}

/// Solid top/bottom coverage per layer and color, indexed `[layer][color]`.
///
/// Colors never overlap in the result: each color is trimmed by all lower
/// colors.
pub fn resolve_top_bottom(
    layers: &[Layer],
    outlines: &[ExPolygons],
    raw: &RawSurfaces,
    num_states: usize,
    cancel: &CancelToken,
) -> Result<Vec<Vec<ExPolygons>>> {
    let num_layers = outlines.len();
    if raw.is_empty() {
        return Ok(vec![vec![ExPolygons::new(); num_states]; num_layers]);
    }
    debug!("MM segmentation - top and bottom layers - begin");

    let contributions: Vec<Vec<Contribution>> = (0..num_layers)
        .into_par_iter()
        .map(|layer_idx| {
            let mut out = Vec::new();
            for color in 0..num_states {
                cancel.check()?;
                let stat = LayerColorStat::new(&layers[layer_idx], color as Color);
                let top = raw.top[color].get(layer_idx).filter(|s| stat.top_solid_layers > 0 && !s.is_empty());
                if let Some(top) = top {
                    propagate(top, layer_idx, color, Direction::Down, &stat, outlines, &raw.bottom, &mut out);
                }
                let bottom = raw.bottom[color].get(layer_idx).filter(|s| stat.bottom_solid_layers > 0 && !s.is_empty());
                if let Some(bottom) = bottom {
                    propagate(bottom, layer_idx, color, Direction::Up, &stat, outlines, &raw.top, &mut out);
                }
            }
            Ok(out)
        })
        .collect::<Result<_>>()?;

    let mut gathered: Vec<Vec<ExPolygons>> = vec![vec![ExPolygons::new(); num_states]; num_layers];
    for contribution in contributions.into_iter().flatten() {
        gathered[contribution.layer_idx][contribution.color].extend(contribution.region);
    }

    let resolved = gathered
        .into_par_iter()
        .enumerate()
        .map(|(layer_idx, per_color)| {
            cancel.check()?;
            let mut merged: Vec<ExPolygons> = Vec::with_capacity(num_states);
            let mut lower = ExPolygons::new();
            for regions in per_color {
                let region = if regions.is_empty() {
                    regions
                } else {
                    difference(&union_ex(&regions), &lower)
                };
                if !region.is_empty() {
                    lower = union(&lower, &region);
                }
                merged.push(region);
            }
            trace!(
                "Layer {}: top/bottom regions for {} colors",
                layer_idx,
                merged.iter().filter(|r| !r.is_empty()).count()
            );
            Ok(merged)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("MM segmentation - top and bottom layers - end");
    Ok(resolved)
}
