//! Color Line Builder.
//!
//! Turns the raw colored loops sliced from the painted mesh into clean painted
//! boundary segments:
//! 1. drop speckles (tiny area, or nothing left after a small inward offset),
//! 2. simplify with a Douglas-Peucker variant that never erases a color change,
//! 3. recolor short runs bracketed by one color,
//! 4. emit closed [`ColorLines`].

use super::color::{
    apply_edge_colors, color_points_to_color_lines, color_polygon_to_color_points, Color, ColorLines,
    ColorPoint, ColorPoints, ColorPolygons,
};
use crate::clipper::{offset_polygons, OffsetJoinType};
use crate::config::SegmentationConfig;
use crate::geometry::douglas_peucker_by;
use crate::{scaled, unscale_area, CoordF};
use log::trace;

/// Remove loops whose area is below `min_area` (mm²) or that vanish when
/// shrunk by `min_offset` (mm). Returns `true` if anything was removed.
pub fn filter_out_small_color_polygons(
    polygons: &mut ColorPolygons,
    min_area: CoordF,
    min_offset: CoordF,
) -> bool {
    let before = polygons.len();
    polygons.retain(|cp| {
        if cp.len() < 3 || unscale_area(cp.area()) < min_area {
            return false;
        }
        min_offset <= 0.0 || !offset_polygons(&[cp.to_polygon()], -min_offset, OffsetJoinType::Miter).is_empty()
    });
    polygons.len() != before
}

/// Douglas-Peucker over color points.
///
/// A reduction between an anchor and a floater is accepted only when the
/// skipped points are within `tolerance` (mm), the color leaving the anchor
/// equals the color entering the floater, and no differently colored sub-run
/// in between is longer than `max_different_color_length` (mm).
pub fn douglas_peucker_colored(
    points: &[ColorPoint],
    tolerance: CoordF,
    max_different_color_length: CoordF,
) -> ColorPoints {
    let tolerance_sq = scaled(tolerance) * scaled(tolerance);
    let max_len_sq = scaled(max_different_color_length) * scaled(max_different_color_length);

    douglas_peucker_by(
        points,
        |cp| cp.p,
        |anchor_idx, floater_idx, max_dist_sq| {
            let anchor = &points[anchor_idx];
            if max_dist_sq > tolerance_sq || anchor.color_next != points[floater_idx].color_prev {
                return false;
            }

            let anchor_color = anchor.color_next;
            let mut different_len_sq = 0.0;
            let mut run_start: Option<&ColorPoint> = None;
            for cp in &points[anchor_idx + 1..floater_idx] {
                if cp.color_next == anchor_color {
                    if let Some(prev) = run_start.take() {
                        different_len_sq += prev.p.distance_squared(&cp.p) as f64;
                    }
                } else if let Some(prev) = run_start {
                    different_len_sq += prev.p.distance_squared(&cp.p) as f64;
                    run_start = Some(cp);
                } else {
                    different_len_sq = 0.0;
                    run_start = Some(cp);
                }

                if different_len_sq > max_len_sq {
                    return false;
                }
            }
            true
        },
    )
}

/// A maximal run of consecutive edges with the same color.
#[derive(Debug, Clone, Copy)]
struct ColorRun {
    /// First edge of the run.
    begin: usize,
    /// Number of edges in the run.
    count: usize,
    color: Color,
    length: f64,
}

/// Recolor short runs that sit between two runs of the same color.
///
/// Walking around the loop from every run, the following runs are skipped
/// while their accumulated length stays within `max_different_color_length`
/// (mm); when a run with the starting color is reached, everything skipped
/// takes that color.
pub fn filter_color_of_small_segments(points: &mut ColorPoints, max_different_color_length: CoordF) {
    let n = points.len();
    if n < 3 {
        return;
    }
    let max_len = scaled(max_different_color_length);

    let mut edge_colors: Vec<Color> = points.iter().map(|cp| cp.color_next).collect();
    let edge_len = |i: usize| points[i].p.distance(&points[(i + 1) % n].p);

    let mut runs: Vec<ColorRun> = Vec::new();
    for i in 0..n {
        match runs.last_mut() {
            Some(run) if run.color == edge_colors[i] => {
                run.count += 1;
                run.length += edge_len(i);
            }
            _ => runs.push(ColorRun {
                begin: i,
                count: 1,
                color: edge_colors[i],
                length: edge_len(i),
            }),
        }
    }
    if runs.len() > 2 && runs[0].color == runs[runs.len() - 1].color {
        if let Some(last) = runs.pop() {
            runs[0].begin = last.begin;
            runs[0].count += last.count;
            runs[0].length += last.length;
        }
    }
    if runs.len() < 2 {
        return;
    }

    let num_runs = runs.len();
    let next = |idx: usize| if idx + 1 < num_runs { idx + 1 } else { 0 };

    let mut from = 0;
    while from < num_runs {
        let mut to = next(from);
        let mut skipped_length = 0.0;
        let mut recolor = false;
        while from != to {
            if skipped_length > max_len {
                break;
            } else if runs[from].color == runs[to].color {
                recolor = true;
                break;
            }
            skipped_length += runs[to].length;
            to = next(to);
        }

        if !recolor {
            from += 1;
            continue;
        }

        let new_color = runs[from].color;
        let mut curr = next(from);
        while curr != to {
            runs[curr].color = new_color;
            for k in 0..runs[curr].count {
                edge_colors[(runs[curr].begin + k) % n] = new_color;
            }
            curr = next(curr);
        }

        if from < to {
            from = to;
        } else {
            break;
        }
    }

    apply_edge_colors(points, &edge_colors);
}

/// Full Color Line Builder for the raw colored loops of one layer.
pub fn build_color_lines(mut polygons: ColorPolygons, config: &SegmentationConfig) -> Vec<ColorLines> {
    if filter_out_small_color_polygons(&mut polygons, config.min_polygon_area, config.min_polygon_offset) {
        trace!("Dropped small painted loops, {} remaining", polygons.len());
    }

    polygons
        .iter()
        .filter_map(|polygon| {
            let points = color_polygon_to_color_points(polygon);
            let mut filtered =
                douglas_peucker_colored(&points, config.color_filter_tolerance, config.color_filter_distance);
            if filtered.len() < 3 {
                return None;
            }
            filter_color_of_small_segments(&mut filtered, config.color_filter_distance);
            Some(color_points_to_color_lines(&filtered))
        })
        .collect()
}
