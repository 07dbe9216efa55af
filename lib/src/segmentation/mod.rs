//! Multi-material segmentation by painting.
//!
//! The pipeline per object:
//! 1. Prepare the outline of every layer
//! 2. Slice the painted volumes into colored loops ([`color_lines`])
//! 3. Project the loop colors onto the outline ([`projection`])
//! 4. Split the colored outline into per-color regions ([`voronoi`])
//! 5. Propagate painted tops and bottoms through solid layers ([`top_bottom`])
//! 6. Trim to the maximum width and merge ([`merge`])
//!
//! All per-layer stages run in parallel and poll a [`CancelToken`].

pub mod cancel;
pub mod color;
pub mod color_lines;
pub mod merge;
pub mod projection;
pub mod top_bottom;
pub mod voronoi;

pub use cancel::CancelToken;
pub use color::Color;

use self::color::{color_points_to_colored_lines, ColorLines, ColoredLines};
use self::color_lines::build_color_lines;
use self::merge::{cut_segmented_layers, merge_segmented_layers};
use self::projection::{prepare_outline, project_colors};
use self::top_bottom::{resolve_top_bottom, RawSurfaces};
use self::voronoi::segment_colored_loops;
use crate::clipper::{difference, intersection, union_ex};
use crate::config::SegmentationConfig;
use crate::geometry::ExPolygons;
use crate::mesh::slicer::slice_colored;
use crate::mesh::{FacetsInfo, PaintKind, PaintedObject, PaintedVolume, TriangleMesh};
use crate::slice::Layer;
use crate::{CoordF, Error, Result};
use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Final segmentation of one layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentedLayer {
    /// Regions indexed by `color - 1`, mutually non-overlapping.
    pub regions: Vec<ExPolygons>,
    /// Part of the outline not claimed by any painted color.
    pub default_region: ExPolygons,
}

impl SegmentedLayer {
    /// Region of `color` (1-based). Color 0 is the default region.
    pub fn region(&self, color: Color) -> Option<&ExPolygons> {
        match color {
            0 => Some(&self.default_region),
            c => self.regions.get(c as usize - 1),
        }
    }

    pub fn is_painted(&self) -> bool {
        self.regions.iter().any(|r| !r.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResult {
    pub layers: Vec<SegmentedLayer>,
}

impl SegmentationResult {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

/// Parameters of one segmentation run that differ between paint kinds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentationParams {
    /// Paint states including the default state 0.
    pub num_states: usize,
    /// Width of the colored band along the outline (mm), 0 = unlimited.
    pub max_width: CoordF,
    pub interlocking_depth: CoordF,
    pub include_top_and_bottom: bool,
}

impl SegmentationParams {
    pub fn multi_material(config: &SegmentationConfig) -> Self {
        Self {
            num_states: config.num_facet_states(),
            max_width: config.max_width,
            interlocking_depth: config.interlocking_depth,
            include_top_and_bottom: config.include_top_and_bottom,
        }
    }

    /// Fuzzy skin only affects external perimeters, so the painted band is
    /// limited to the widest external perimeter.
    pub fn fuzzy_skin(layers: &[Layer]) -> Self {
        let max_width = layers
            .iter()
            .flat_map(|l| l.regions.iter())
            .map(|r| r.config.external_perimeter_extrusion_width)
            .fold(0.0, CoordF::max);
        Self {
            num_states: 2,
            max_width,
            interlocking_depth: 0.0,
            include_top_and_bottom: false,
        }
    }
}

/// Multi-material segmentation of `layers` by the paint on `object`.
pub fn multi_material_segmentation_by_painting(
    object: &PaintedObject,
    layers: &[Layer],
    config: &SegmentationConfig,
    cancel: &CancelToken,
) -> Result<SegmentationResult> {
    let params = SegmentationParams::multi_material(config);
    segmentation_by_painting(
        object,
        layers,
        |volume: &PaintedVolume| volume.facets_info(PaintKind::MultiMaterial),
        &params,
        config,
        cancel,
    )
}

/// Fuzzy skin segmentation: region 0 of every layer is the fuzzy part.
pub fn fuzzy_skin_segmentation_by_painting(
    object: &PaintedObject,
    layers: &[Layer],
    config: &SegmentationConfig,
    cancel: &CancelToken,
) -> Result<SegmentationResult> {
    let params = SegmentationParams::fuzzy_skin(layers);
    segmentation_by_painting(
        object,
        layers,
        |volume: &PaintedVolume| volume.facets_info(PaintKind::FuzzySkin),
        &params,
        config,
        cancel,
    )
}

/// Segmentation driven by the paint `extract_facets_info` reads from each
/// volume. Runs on a dedicated pool when `config.threads` is set.
pub fn segmentation_by_painting<F>(
    object: &PaintedObject,
    layers: &[Layer],
    extract_facets_info: F,
    params: &SegmentationParams,
    config: &SegmentationConfig,
    cancel: &CancelToken,
) -> Result<SegmentationResult>
where
    F: Fn(&PaintedVolume) -> FacetsInfo + Sync,
{
    config.validate()?;
    object.validate()?;
    if params.num_states < 2 {
        return Err(Error::Config(format!("need at least 2 paint states, got {}", params.num_states)));
    }
    if layers.windows(2).any(|w| w[1].slice_z < w[0].slice_z) {
        return Err(Error::Config("layers must be ordered by height".into()));
    }

    if config.threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| Error::Config(format!("failed to build thread pool: {}", e)))?;
        pool.install(|| run_segmentation(object, layers, &extract_facets_info, params, config, cancel))
    } else {
        run_segmentation(object, layers, &extract_facets_info, params, config, cancel)
    }
}

fn run_segmentation<F>(
    object: &PaintedObject,
    layers: &[Layer],
    extract_facets_info: &F,
    params: &SegmentationParams,
    config: &SegmentationConfig,
    cancel: &CancelToken,
) -> Result<SegmentationResult>
where
    F: Fn(&PaintedVolume) -> FacetsInfo + Sync,
{
    let num_states = params.num_states;

    debug!("MM segmentation - slices preprocessing - begin");
    let outlines: Vec<ExPolygons> = layers
        .par_iter()
        .map(|layer| {
            cancel.check()?;
            Ok(prepare_outline(&layer.outline(), config.min_polygon_area))
        })
        .collect::<Result<_>>()?;
    debug!("MM segmentation - slices preprocessing - end");

    let volumes: Vec<(&TriangleMesh, Vec<Color>)> = object
        .model_parts()
        .map(|volume| {
            let info = extract_facets_info(volume);
            let colors = info.resolve_colors(volume.mesh.triangle_count(), volume.extruder_id, num_states);
            (&volume.mesh, colors)
        })
        .collect();

    if volumes.iter().all(|(_, colors)| colors.iter().all(|&c| c == 0)) {
        debug!("MM segmentation - object is not painted");
        return Ok(unpainted_result(outlines, num_states));
    }

    let zs: Vec<CoordF> = layers.iter().map(|l| l.slice_z).collect();

    debug!("MM segmentation - slicing painted triangles - begin");
    let mut color_lines: Vec<Vec<ColorLines>> = vec![Vec::new(); layers.len()];
    for (mesh, colors) in &volumes {
        let built: Vec<Vec<ColorLines>> = slice_colored(mesh, colors, &zs)
            .into_par_iter()
            .map(|polygons| {
                cancel.check()?;
                Ok(build_color_lines(polygons, config))
            })
            .collect::<Result<_>>()?;
        for (dst, src) in color_lines.iter_mut().zip(built) {
            dst.extend(src);
        }
    }
    debug!("MM segmentation - slicing painted triangles - end");

    debug!("MM segmentation - layers segmentation - begin");
    let mut segmented: Vec<Vec<ExPolygons>> = outlines
        .par_iter()
        .zip(color_lines.par_iter())
        .enumerate()
        .map(|(layer_idx, (outline, lines))| {
            cancel.check()?;
            Ok(segment_layer(layer_idx, outline, lines, num_states, config))
        })
        .collect::<Result<_>>()?;
    debug!("MM segmentation - layers segmentation - end");
    cancel.check()?;

    let top_bottom = if params.include_top_and_bottom {
        let raw = RawSurfaces::collect(&volumes, &zs, &outlines, num_states);
        let resolved = resolve_top_bottom(layers, &outlines, &raw, num_states, cancel)?;
        cancel.check()?;
        Some(resolved)
    } else {
        None
    };

    if params.max_width > 0.0 {
        cut_segmented_layers(&outlines, &mut segmented, params.max_width, params.interlocking_depth, cancel)?;
        cancel.check()?;
    }

    let merged = merge_segmented_layers(&segmented, top_bottom.as_deref(), num_states, cancel)?;
    cancel.check()?;

    let layers = merged
        .into_par_iter()
        .zip(outlines.into_par_iter())
        .map(|(regions, outline)| {
            let colored: ExPolygons = regions.iter().flatten().cloned().collect();
            let default_region = if colored.is_empty() {
                outline
            } else {
                difference(&outline, &union_ex(&colored))
            };
            SegmentedLayer { regions, default_region }
        })
        .collect();
    Ok(SegmentationResult { layers })
}

/// Side-wall regions of one layer, indexed by color.
fn segment_layer(
    layer_idx: usize,
    outline: &ExPolygons,
    color_lines: &[ColorLines],
    num_states: usize,
    config: &SegmentationConfig,
) -> Vec<ExPolygons> {
    let mut regions = vec![ExPolygons::new(); num_states];
    if outline.is_empty() {
        return regions;
    }

    let color_points = project_colors(outline, color_lines, config);
    let colored: Vec<ColoredLines> = color_points_to_colored_lines(&color_points);
    let mut all_lines = colored.iter().flatten();

    let Some(first) = all_lines.next() else {
        regions[0] = outline.clone();
        return regions;
    };
    if all_lines.all(|l| l.color == first.color) {
        trace!("Layer {}: single color {}", layer_idx, first.color);
        if let Some(region) = regions.get_mut(first.color as usize) {
            *region = outline.clone();
        }
        return regions;
    }

    let segmented = segment_colored_loops(&colored, num_states, config.voronoi_sample_spacing);
    for (region, cells) in regions.iter_mut().zip(segmented) {
        if !cells.is_empty() {
            *region = intersection(&cells, outline);
        }
    }
    trace!(
        "Layer {}: {} colored regions from {} loops",
        layer_idx,
        regions.iter().filter(|r| !r.is_empty()).count(),
        colored.len()
    );
    regions
}

fn unpainted_result(outlines: Vec<ExPolygons>, num_states: usize) -> SegmentationResult {
    SegmentationResult {
        layers: outlines
            .into_iter()
            .map(|outline| SegmentedLayer {
                regions: vec![ExPolygons::new(); num_states - 1],
                default_region: outline,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipper::total_area_mm2;
    use crate::config::RegionConfig;
    use crate::geometry::{Point, Point3F, Polygon};
    use crate::slice::LayerRegion;

    fn square_mm(size: f64) -> ExPolygons {
        vec![Polygon::rectangle(Point::new_scale(0.0, 0.0), Point::new_scale(size, size)).into()]
    }

    fn box_layers(num_layers: usize, size: f64, config: RegionConfig) -> Vec<Layer> {
        (0..num_layers)
            .map(|i| {
                Layer::new(i, 0.2 * (i + 1) as f64, 0.2)
                    .with_region(LayerRegion::from_expolygons(config.clone(), square_mm(size)))
            })
            .collect()
    }

    fn painted_box(size: f64, height: f64, faces: &[usize], color: Color) -> PaintedObject {
        let mesh = TriangleMesh::cuboid(Point3F::new(0.0, 0.0, 0.0), Point3F::new(size, size, height));
        let mut volume = PaintedVolume::new(mesh);
        volume.paint(faces.iter().copied(), color);
        PaintedObject::new(vec![volume])
    }

    #[test]
    fn test_unpainted_object_keeps_default_region() {
        let object = painted_box(10.0, 1.0, &[], 1);
        let layers = box_layers(5, 10.0, RegionConfig::default());
        let config = SegmentationConfig::default().with_num_extruders(2);
        let result = multi_material_segmentation_by_painting(&object, &layers, &config, &CancelToken::new()).unwrap();
        assert_eq!(result.num_layers(), 5);
        for layer in &result.layers {
            assert_eq!(layer.regions.len(), 2);
            assert!(!layer.is_painted());
            assert!((total_area_mm2(&layer.default_region) - 100.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_fully_painted_sides_take_whole_outline() {
        // Every side face painted with extruder 2.
        let object = painted_box(10.0, 2.0, &[4, 5, 6, 7, 8, 9, 10, 11], 2);
        let layers = box_layers(10, 10.0, RegionConfig::default().with_solid_layers(0, 0));
        let config = SegmentationConfig::default().with_num_extruders(2);
        let result = multi_material_segmentation_by_painting(&object, &layers, &config, &CancelToken::new()).unwrap();

        let layer = &result.layers[5];
        assert!(layer.regions[0].is_empty());
        assert!((total_area_mm2(&layer.regions[1]) - 100.0).abs() < 0.01);
        assert!(total_area_mm2(&layer.default_region) < 0.01);
        assert_eq!(layer.region(2), Some(&layer.regions[1]));
    }

    #[test]
    fn test_fuzzy_skin_band_width() {
        let mut object = painted_box(10.0, 2.0, &[], 0);
        object.volumes[0].fuzzy_skin = vec![1; 12];
        let region = RegionConfig {
            external_perimeter_extrusion_width: 0.5,
            ..Default::default()
        };
        let layers = box_layers(10, 10.0, region);
        let config = SegmentationConfig::default();
        let result = fuzzy_skin_segmentation_by_painting(&object, &layers, &config, &CancelToken::new()).unwrap();

        let layer = &result.layers[4];
        assert_eq!(layer.regions.len(), 1);
        let band = total_area_mm2(&layer.regions[0]);
        assert!((band - (100.0 - 81.0)).abs() < 0.05, "band area {}", band);
        assert!((total_area_mm2(&layer.default_region) - 81.0).abs() < 0.05);
    }

    #[test]
    fn test_rejects_unordered_layers() {
        let object = painted_box(10.0, 1.0, &[2, 3], 1);
        let mut layers = box_layers(3, 10.0, RegionConfig::default());
        layers.swap(0, 2);
        let result = multi_material_segmentation_by_painting(
            &object,
            &layers,
            &SegmentationConfig::default(),
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_dedicated_thread_pool() {
        let object = painted_box(10.0, 2.0, &[4, 5, 6, 7, 8, 9, 10, 11], 1);
        let layers = box_layers(10, 10.0, RegionConfig::default());
        let config = SegmentationConfig::default().with_num_extruders(2).with_threads(2);
        let result = multi_material_segmentation_by_painting(&object, &layers, &config, &CancelToken::new()).unwrap();
        assert!((total_area_mm2(&result.layers[5].regions[0]) - 100.0).abs() < 0.01);
    }
}
