//! Classified slice surfaces.
//!
//! Segmentation runs right after slicing, when every surface is still
//! internal. Surfaces already classified as external tops or bottoms are not
//! part of the outline that gets segmented.

use crate::geometry::ExPolygon;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    Top,
    Bottom,
    BottomBridge,
    InternalSolid,
    #[default]
    Internal,
    InternalBridge,
    /// Enclosed space that receives no extrusion.
    InternalVoid,
}

impl SurfaceType {
    /// Internal surfaces, void included.
    #[inline]
    pub fn is_internal(self) -> bool {
        !matches!(self, SurfaceType::Top | SurfaceType::Bottom | SurfaceType::BottomBridge)
    }
}

/// One ExPolygon of a layer region with its classification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Surface {
    pub expolygon: ExPolygon,
    #[serde(default)]
    pub surface_type: SurfaceType,
}

impl Surface {
    pub fn new(expolygon: ExPolygon, surface_type: SurfaceType) -> Self {
        Self {
            expolygon,
            surface_type,
        }
    }

    pub fn internal(expolygon: ExPolygon) -> Self {
        Self::new(expolygon, SurfaceType::Internal)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.expolygon.is_empty()
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        self.surface_type.is_internal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};

    #[test]
    fn test_void_counts_as_internal() {
        assert!(SurfaceType::InternalVoid.is_internal());
        assert!(SurfaceType::InternalSolid.is_internal());
        assert!(!SurfaceType::Top.is_internal());
        assert!(!SurfaceType::BottomBridge.is_internal());
        assert_eq!(SurfaceType::default(), SurfaceType::Internal);
    }

    #[test]
    fn test_surface_type_from_json() {
        let parsed: SurfaceType = serde_json::from_str("\"internal_void\"").unwrap();
        assert_eq!(parsed, SurfaceType::InternalVoid);

        let square = Polygon::rectangle(Point::new(0, 0), Point::new(10, 10));
        let surface = Surface::new(square.into(), SurfaceType::Top);
        assert!(!surface.is_internal());
        assert!(!surface.is_empty());
    }
}
