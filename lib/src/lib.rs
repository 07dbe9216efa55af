//! # MM Segmentation
//!
//! Multi-material paint segmentation for FFF slicing.
//!
//! Given a mesh whose triangles carry painted color states and the per-layer
//! outlines produced by the slicer, this library decides which part of every
//! layer is printed with which extruder:
//! - Colored plane slicing of the painted mesh
//! - Projection of painted colors onto the true slice outline
//! - Voronoi segmentation of the colored outline into per-color regions
//! - Solid top/bottom propagation of painted surfaces
//! - Width trimming and final non-overlapping merge
//!
//! ## Example
//!
//! ```rust,ignore
//! use mm_segmentation::{multi_material_segmentation_by_painting, CancelToken, SegmentationConfig};
//!
//! let config = SegmentationConfig::default().with_num_extruders(2);
//! let result = multi_material_segmentation_by_painting(&object, &layers, &config, &CancelToken::new())?;
//! for (layer_idx, layer) in result.layers.iter().enumerate() {
//!     println!("layer {}: {} colored regions", layer_idx, layer.regions.len());
//! }
//! ```

// Core modules
pub mod clipper;
pub mod config;
pub mod edge_grid;
pub mod geometry;
pub mod mesh;
pub mod segmentation;
pub mod slice;

// Re-export commonly used types
pub use config::{RegionConfig, SegmentationConfig};
pub use geometry::{BoundingBox, ExPolygon, ExPolygons, Line, Point, PointF, Polygon, Polygons};
pub use mesh::{PaintedObject, PaintedVolume, TriangleMesh};
pub use slice::{Layer, LayerRegion, Surface, SurfaceType};

// Re-export clipper operations
pub use clipper::{
    difference, intersection, offset_expolygons, opening, union, union_ex, OffsetJoinType,
};

// Re-export segmentation entry points
pub use segmentation::{
    fuzzy_skin_segmentation_by_painting, multi_material_segmentation_by_painting, CancelToken,
    Color, SegmentationResult, SegmentedLayer,
};

/// Coordinate type used throughout the library.
/// Using i64 for integer coordinates (scaled by SCALING_FACTOR) to avoid floating-point issues.
pub type Coord = i64;

/// Floating-point coordinate type for unscaled values.
pub type CoordF = f64;

/// Scaling factor: coordinates are stored as integers scaled by this factor.
/// 1 unit = 1 nanometer, so 1mm = 1_000_000 units.
pub const SCALING_FACTOR: f64 = 1_000_000.0;

/// Smallest distance considered meaningful, in scaled units (100 nm).
pub const SCALED_EPSILON: Coord = 100;

/// Scale a floating-point coordinate to integer.
#[inline]
pub fn scale(v: CoordF) -> Coord {
    (v * SCALING_FACTOR).round() as Coord
}

/// Unscale an integer coordinate to floating-point.
#[inline]
pub fn unscale(v: Coord) -> CoordF {
    v as CoordF / SCALING_FACTOR
}

/// Scale a floating-point length without rounding.
#[inline]
pub fn scaled(v: CoordF) -> CoordF {
    v * SCALING_FACTOR
}

/// Unscale a floating-point length given in scaled units.
#[inline]
pub fn unscaled(v: CoordF) -> CoordF {
    v / SCALING_FACTOR
}

/// Convert an area in scaled² units to mm².
#[inline]
pub fn unscale_area(area: CoordF) -> CoordF {
    area / (SCALING_FACTOR * SCALING_FACTOR)
}

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for segmentation operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mesh error: {0}")]
    Mesh(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cancelled")]
    Cancelled,
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling() {
        // 1mm should scale to 1_000_000
        assert_eq!(scale(1.0), 1_000_000);

        // And back
        assert!((unscale(1_000_000) - 1.0).abs() < 1e-10);

        // The epsilon used by outline preprocessing is 100 nanometers
        assert_eq!(scale(0.0001), SCALED_EPSILON);
        assert!((scaled(0.4) - 400_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_unscale_area() {
        let area = 200.0 * SCALING_FACTOR * SCALING_FACTOR;
        assert!((unscale_area(area) - 200.0).abs() < 1e-9);
    }
}
