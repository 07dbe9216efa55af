//! Layer data structure.
//!
//! A [`Layer`] is the per-layer input of the segmentation: its heights and the
//! sliced regions, each with its own print settings.

use super::Surface;
use crate::clipper::union_ex;
use crate::config::RegionConfig;
use crate::geometry::{ExPolygon, ExPolygons};
use crate::CoordF;
use serde::{Deserialize, Serialize};

/// Represents a single layer of a sliced object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Layer {
    /// Layer index (0-based).
    pub id: usize,

    /// Z coordinate of the slicing plane (mm), usually the middle of the layer.
    pub slice_z: CoordF,

    /// Z coordinate of the top of this layer (mm).
    pub print_z: CoordF,

    /// Height/thickness of this layer (mm).
    pub height: CoordF,

    /// The sliced regions at this layer.
    pub regions: Vec<LayerRegion>,
}

/// A region of a layer printed with one set of settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LayerRegion {
    pub config: RegionConfig,
    pub slices: Vec<Surface>,
}

impl LayerRegion {
    pub fn new(config: RegionConfig, slices: Vec<Surface>) -> Self {
        Self { config, slices }
    }

    /// Region covering `expolygons` as internal surfaces.
    pub fn from_expolygons(config: RegionConfig, expolygons: ExPolygons) -> Self {
        Self::new(config, expolygons.into_iter().map(Surface::internal).collect())
    }
}

impl Layer {
    /// Create an empty layer.
    pub fn new(id: usize, print_z: CoordF, height: CoordF) -> Self {
        Self {
            id,
            slice_z: print_z - 0.5 * height,
            print_z,
            height,
            regions: Vec::new(),
        }
    }

    /// Z of the bottom of the layer (mm).
    #[inline]
    pub fn bottom_z(&self) -> CoordF {
        self.print_z - self.height
    }

    pub fn add_region(&mut self, region: LayerRegion) {
        self.regions.push(region);
    }

    /// Builder-style variant of [`Layer::add_region`].
    pub fn with_region(mut self, region: LayerRegion) -> Self {
        self.regions.push(region);
        self
    }

    /// Internal surfaces of all regions.
    pub fn internal_expolygons(&self) -> impl Iterator<Item = &ExPolygon> {
        self.regions
            .iter()
            .flat_map(|r| r.slices.iter())
            .filter(|s| s.is_internal() && !s.is_empty())
            .map(|s| &s.expolygon)
    }

    /// True when the layer has no internal surface to segment.
    pub fn is_empty(&self) -> bool {
        self.internal_expolygons().next().is_none()
    }

    /// Union of the internal surfaces of all regions.
    pub fn outline(&self) -> ExPolygons {
        let slices: ExPolygons = self.internal_expolygons().cloned().collect();
        union_ex(&slices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};
    use crate::slice::SurfaceType;
    use crate::{scale, unscale_area};

    fn square(x: f64, size: f64) -> ExPolygon {
        Polygon::rectangle(
            Point::new(scale(x), 0),
            Point::new(scale(x + size), scale(size)),
        )
        .into()
    }

    #[test]
    fn test_layer_heights() {
        let layer = Layer::new(3, 0.8, 0.2);
        assert!((layer.slice_z - 0.7).abs() < 1e-12);
        assert!((layer.bottom_z() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_outline_unions_internal_surfaces_only() {
        let region = LayerRegion::new(
            RegionConfig::default(),
            vec![
                Surface::internal(square(0.0, 10.0)),
                Surface::internal(square(5.0, 10.0)),
                Surface::new(square(40.0, 10.0), SurfaceType::Top),
            ],
        );
        let layer = Layer::new(0, 0.2, 0.2).with_region(region);
        let outline = layer.outline();
        assert_eq!(outline.len(), 1);
        assert!((unscale_area(outline[0].area()) - 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_layer_without_internal_surfaces_is_empty() {
        let region = LayerRegion::new(
            RegionConfig::default(),
            vec![Surface::new(square(0.0, 1.0), SurfaceType::Bottom)],
        );
        let layer = Layer::new(0, 0.2, 0.2).with_region(region);
        assert!(layer.is_empty());
        assert!(layer.outline().is_empty());
    }
}
