//! Region Merger/Cutter.
//!
//! Side-wall regions from the Voronoi segmentation are optionally trimmed
//! to a maximum width, then combined with the top/bottom regions into the
//! final per-layer, per-color output.

use super::cancel::CancelToken;
use crate::clipper::{difference, offset2, offset_expolygons, union, union_ex, OffsetJoinType};
use crate::geometry::ExPolygons;
use crate::{unscale, CoordF, Result, SCALED_EPSILON};
use log::debug;
use rayon::prelude::*;

/// Width of the band kept along the outline on layer `layer_idx` (mm).
///
/// With interlocking, even layers use the reduced width so neighbouring
/// colors overlap layer by layer.
pub fn cut_width(layer_idx: usize, max_width: CoordF, interlocking_depth: CoordF) -> CoordF {
    let interlocking = if interlocking_depth > 0.0 {
        (max_width - interlocking_depth).max(0.0)
    } else {
        0.0
    };
    if layer_idx % 2 == 0 && interlocking > 0.0 {
        interlocking
    } else {
        max_width
    }
}

/// Trim every segmented region to the band of `max_width` along the layer
/// outline. `segmented` is indexed `[layer][color]`.
pub fn cut_segmented_layers(
    outlines: &[ExPolygons],
    segmented: &mut [Vec<ExPolygons>],
    max_width: CoordF,
    interlocking_depth: CoordF,
    cancel: &CancelToken,
) -> Result<()> {
    debug!("MM segmentation - cutting segmented layers - begin");
    segmented
        .par_iter_mut()
        .zip(outlines.par_iter())
        .enumerate()
        .try_for_each(|(layer_idx, (regions, outline))| -> Result<()> {
            cancel.check()?;
            let width = cut_width(layer_idx, max_width, interlocking_depth);
            if width <= 0.0 {
                return Ok(());
            }
            let inner = offset_expolygons(outline, -width, OffsetJoinType::Miter);
            for region in regions.iter_mut().filter(|r| !r.is_empty()) {
                *region = difference(region, &inner);
            }
            Ok(())
        })?;
    debug!("MM segmentation - cutting segmented layers - end");
    Ok(())
}

/// Combine side-wall regions with the top/bottom regions of one layer.
///
/// Both inputs are indexed by color. The result is indexed by `color - 1`.
/// Side walls give way to any top/bottom region, and every color gives way
/// to all lower colors.
pub fn merge_layer(side: &[ExPolygons], top_bottom: Option<&[ExPolygons]>, num_states: usize) -> Vec<ExPolygons> {
    let eps = unscale(SCALED_EPSILON);
    let empty = ExPolygons::new();
    let mut merged = Vec::with_capacity(num_states.saturating_sub(1));
    let mut claimed = ExPolygons::new();

    for color in 1..num_states {
        let mut region = side.get(color).cloned().unwrap_or_default();
        if let Some(top_bottom) = top_bottom {
            for surface in top_bottom.iter().filter(|s| !s.is_empty()) {
                if region.is_empty() {
                    break;
                }
                region = difference(&region, surface);
            }

            let own = top_bottom.get(color).unwrap_or(&empty);
            if !own.is_empty() {
                if region.is_empty() {
                    region = own.clone();
                } else {
                    region.extend(own.iter().cloned());
                    // Close the seams between side walls and caps.
                    region = offset2(&union_ex(&region), eps, -eps, OffsetJoinType::Miter);
                }
            }
        }

        if !region.is_empty() {
            if !claimed.is_empty() {
                region = difference(&region, &claimed);
            }
            claimed = union(&claimed, &region);
        }
        merged.push(region);
    }
    merged
}

/// [`merge_layer`] over all layers. `top_bottom` is indexed `[layer][color]`.
pub fn merge_segmented_layers(
    segmented: &[Vec<ExPolygons>],
    top_bottom: Option<&[Vec<ExPolygons>]>,
    num_states: usize,
    cancel: &CancelToken,
) -> Result<Vec<Vec<ExPolygons>>> {
    debug!("MM segmentation - merging segmented layers - begin");
    let merged = segmented
        .par_iter()
        .enumerate()
        .map(|(layer_idx, side)| {
            cancel.check()?;
            let caps = top_bottom.and_then(|tb| tb.get(layer_idx)).map(Vec::as_slice);
            Ok(merge_layer(side, caps, num_states))
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("MM segmentation - merging segmented layers - end");
    Ok(merged)
}
