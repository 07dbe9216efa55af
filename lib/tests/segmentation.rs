//! End-to-end segmentation scenarios on painted boxes.

use mm_segmentation::clipper::{intersection, total_area_mm2, union_ex};
use mm_segmentation::geometry::Point3F;
use mm_segmentation::segmentation::color::{ColorLine, ColorLines, ColorPolygon};
use mm_segmentation::segmentation::color_lines::build_color_lines;
use mm_segmentation::segmentation::projection::project_colors;
use mm_segmentation::{
    multi_material_segmentation_by_painting, CancelToken, Color, Error, ExPolygons, Layer, LayerRegion, Line,
    PaintedObject, PaintedVolume, Point, Polygon, RegionConfig, SegmentationConfig, TriangleMesh,
};

// Face indices of `TriangleMesh::cuboid`.
const TOP: [usize; 2] = [2, 3];
const FRONT: [usize; 2] = [4, 5];
const RIGHT: [usize; 2] = [6, 7];
const BACK: [usize; 2] = [8, 9];
const LEFT: [usize; 2] = [10, 11];

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

fn painted_box(size: f64, height: f64, paint: &[(&[usize], Color)]) -> PaintedObject {
    let mesh = TriangleMesh::cuboid(Point3F::new(0.0, 0.0, 0.0), Point3F::new(size, size, height));
    let mut volume = PaintedVolume::new(mesh);
    for (faces, color) in paint {
        volume.paint(faces.iter().copied(), *color);
    }
    PaintedObject::new(vec![volume])
}

fn two_extruders() -> SegmentationConfig {
    SegmentationConfig::default().with_num_extruders(2)
}

#[test]
fn test_diagonal_split_of_box() {
    let object = painted_box(20.0, 2.0, &[(&FRONT, 1), (&RIGHT, 1), (&BACK, 2), (&LEFT, 2)]);
    let layers = box_layers(10, 20.0, RegionConfig::default());
    let result = multi_material_segmentation_by_painting(&object, &layers, &two_extruders(), &CancelToken::new())
        .unwrap();

    for layer_idx in 3..=6 {
        let layer = &result.layers[layer_idx];
        let area_1 = total_area_mm2(&layer.regions[0]);
        let area_2 = total_area_mm2(&layer.regions[1]);
        assert!((area_1 - 200.0).abs() < 0.5, "layer {} color 1 area {}", layer_idx, area_1);
        assert!((area_2 - 200.0).abs() < 0.5, "layer {} color 2 area {}", layer_idx, area_2);

        let overlap = total_area_mm2(&intersection(&layer.regions[0], &layer.regions[1]));
        assert!(overlap < 1e-3, "layer {} overlap {}", layer_idx, overlap);

        let mut all = layer.regions.concat();
        all.extend(layer.default_region.iter().cloned());
        let covered = total_area_mm2(&union_ex(&all));
        assert!((covered - 400.0).abs() < 0.01, "layer {} covered {}", layer_idx, covered);
    }
}

#[test]
fn test_single_color_takes_whole_outline() {
    let all_faces: Vec<usize> = (0..12).collect();
    let object = painted_box(10.0, 2.0, &[(&all_faces, 2)]);
    let layers = box_layers(10, 10.0, RegionConfig::default());
    let result = multi_material_segmentation_by_painting(&object, &layers, &two_extruders(), &CancelToken::new())
        .unwrap();

    for (layer_idx, layer) in result.layers.iter().enumerate() {
        assert!(layer.regions[0].is_empty(), "layer {}", layer_idx);
        let area = total_area_mm2(&layer.regions[1]);
        assert!((area - 100.0).abs() < 0.05, "layer {} area {}", layer_idx, area);
        assert!(total_area_mm2(&layer.default_region) < 0.05);
    }
}

#[test]
fn test_segmentation_is_deterministic() {
    let object = painted_box(12.0, 1.0, &[(&FRONT, 1), (&RIGHT, 2), (&BACK, 1)]);
    let layers = box_layers(5, 12.0, RegionConfig::default());
    let config = two_extruders();
    let first = multi_material_segmentation_by_painting(&object, &layers, &config, &CancelToken::new()).unwrap();
    let second = multi_material_segmentation_by_painting(&object, &layers, &config, &CancelToken::new()).unwrap();
    assert_eq!(first, second);
}

/// Box whose top face is split into a centered square patch, returned as
/// faces 2 and 3, and a ring of eight triangles around it.
fn box_with_top_patch(size: f64, height: f64, patch_area: f64) -> TriangleMesh {
    let mut mesh = TriangleMesh::cuboid(Point3F::new(0.0, 0.0, 0.0), Point3F::new(size, size, height));
    let (lo, hi) = (0.5 * (size - patch_area.sqrt()), 0.5 * (size + patch_area.sqrt()));
    mesh.vertices.extend([
        Point3F::new(lo, lo, height),
        Point3F::new(hi, lo, height),
        Point3F::new(hi, hi, height),
        Point3F::new(lo, hi, height),
    ]);
    mesh.indices[2] = [8, 9, 10];
    mesh.indices[3] = [8, 10, 11];
    mesh.indices.extend([
        [4, 5, 9],
        [4, 9, 8],
        [5, 6, 10],
        [5, 10, 9],
        [6, 7, 11],
        [6, 11, 10],
        [7, 4, 8],
        [7, 8, 11],
    ]);
    mesh
}

#[test]
fn test_top_patch_propagates_through_solid_layers() {
    let mut volume = PaintedVolume::new(box_with_top_patch(10.0, 2.2, 5.0));
    volume.paint(TOP, 1);
    let object = PaintedObject::new(vec![volume]);
    assert!(object.validate().is_ok());
    let layers = box_layers(11, 10.0, RegionConfig::default().with_solid_layers(3, 3));
    let result = multi_material_segmentation_by_painting(&object, &layers, &two_extruders(), &CancelToken::new())
        .unwrap();

    let areas: Vec<f64> = [10, 9, 8, 7]
        .iter()
        .map(|&i| total_area_mm2(&result.layers[i].regions[0]))
        .collect();
    assert!((areas[0] - 5.0).abs() < 0.05, "areas {:?}", areas);
    assert!(areas[1] > 0.0 && areas[2] > 0.0, "areas {:?}", areas);
    assert!(areas[1] <= areas[0] + 1e-6 && areas[2] <= areas[1] + 1e-6, "areas {:?}", areas);
    assert_eq!(areas[3], 0.0);
    assert!(result.layers[5].regions[0].is_empty());
}

#[test]
fn test_far_painted_segment_has_no_effect() {
    let config = SegmentationConfig::default();
    let outline = square_mm(10.0);
    let loop_at = |x0: f64, size: f64, colors: [Color; 4]| -> ColorLines {
        let p = [
            Point::new_scale(x0, 0.0),
            Point::new_scale(x0 + size, 0.0),
            Point::new_scale(x0 + size, size),
            Point::new_scale(x0, size),
        ];
        (0..4)
            .map(|i| ColorLine {
                line: Line::new(p[i], p[(i + 1) % 4]),
                color: colors[i],
            })
            .collect()
    };

    let near = vec![loop_at(0.0, 10.0, [1, 1, 2, 2])];
    let mut with_far = near.clone();
    with_far.push(loop_at(30.0, 5.0, [3, 3, 3, 3]));

    let expected = project_colors(&outline, &near, &config);
    assert_eq!(project_colors(&outline, &with_far, &config), expected);
}

#[test]
fn test_short_color_run_is_filtered() {
    let pt = Point::new_scale;
    let polygon = ColorPolygon::new(
        vec![pt(0.0, 0.0), pt(5.0, 0.0), pt(5.1, 0.0), pt(10.0, 0.0), pt(10.0, 10.0), pt(0.0, 10.0)],
        vec![1, 2, 1, 1, 1, 3],
    );
    let lines = build_color_lines(vec![polygon], &SegmentationConfig::default());
    assert_eq!(lines.len(), 1);
    assert!(lines[0].iter().all(|l| l.color != 2));
    assert!(lines[0].iter().any(|l| l.color == 3));
}

#[test]
fn test_cancelled_segmentation() {
    let object = painted_box(10.0, 1.0, &[(&FRONT, 1)]);
    let layers = box_layers(5, 10.0, RegionConfig::default());
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = multi_material_segmentation_by_painting(&object, &layers, &two_extruders(), &cancel);
    assert!(matches!(result, Err(Error::Cancelled)));
}
