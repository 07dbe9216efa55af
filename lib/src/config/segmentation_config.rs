//! Segmentation configuration types.
//!
//! [`SegmentationConfig`] holds the object-wide settings of the painting
//! segmentation; [`RegionConfig`] the per print region settings read by the
//! top/bottom propagation and the width trimming.

use crate::{CoordF, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Object-wide settings of the painting segmentation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    // === Extruders ===
    /// Number of physical extruders. Paint states are 0 (default) up to this value.
    pub num_extruders: usize,

    // === Region trimming ===
    /// Maximum width of a painted region measured from the outline (mm), 0 = unlimited.
    pub max_width: CoordF,
    /// Depth of the interlocking structure between colors (mm), 0 = off.
    pub interlocking_depth: CoordF,

    // === Top/bottom ===
    /// Propagate painted top and bottom surfaces into solid layers.
    pub include_top_and_bottom: bool,

    // === Projection tolerances (mm) ===
    /// Maximum distance of a painted boundary from the outline to be projected onto it.
    pub max_projection_distance: CoordF,
    /// Color changes closer than this to a line end snap to the end.
    pub max_snap_distance: CoordF,
    /// Color runs shorter than this are absorbed by the surrounding color.
    pub color_filter_distance: CoordF,
    /// Douglas-Peucker tolerance for the painted loops.
    pub color_filter_tolerance: CoordF,
    /// Douglas-Peucker tolerance for the resolved outline.
    pub input_filter_tolerance: CoordF,

    // === Small feature filtering ===
    /// Painted loops below this area (mm²) are discarded.
    pub min_polygon_area: CoordF,
    /// Painted loops vanishing under an inward offset of this size (mm) are discarded.
    pub min_polygon_offset: CoordF,

    // === Voronoi ===
    /// Spacing of the point sites sampled along every outline segment (mm).
    pub voronoi_sample_spacing: CoordF,

    // === Execution ===
    /// Worker threads, 0 = rayon default.
    pub threads: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            num_extruders: 4,
            max_width: 0.0,
            interlocking_depth: 0.0,
            include_top_and_bottom: true,
            max_projection_distance: 0.4,
            max_snap_distance: 0.01,
            color_filter_distance: 0.2,
            color_filter_tolerance: 0.02,
            input_filter_tolerance: 0.001,
            min_polygon_area: 0.1,
            min_polygon_offset: 0.01,
            voronoi_sample_spacing: 0.2,
            threads: 0,
        }
    }
}

impl SegmentationConfig {
    /// Load a configuration from a JSON file. Missing keys take default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of paint states, including the default state 0.
    #[inline]
    pub fn num_facet_states(&self) -> usize {
        self.num_extruders + 1
    }

    /// Check ranges of all settings.
    pub fn validate(&self) -> Result<()> {
        if self.num_extruders == 0 {
            return Err(Error::Config("num_extruders must be at least 1".into()));
        }
        if self.num_extruders > u8::MAX as usize - 1 {
            return Err(Error::Config(format!(
                "num_extruders {} exceeds the supported maximum of {}",
                self.num_extruders,
                u8::MAX - 1
            )));
        }
        let non_negative = [
            ("max_width", self.max_width),
            ("interlocking_depth", self.interlocking_depth),
            ("max_projection_distance", self.max_projection_distance),
            ("max_snap_distance", self.max_snap_distance),
            ("color_filter_distance", self.color_filter_distance),
            ("color_filter_tolerance", self.color_filter_tolerance),
            ("input_filter_tolerance", self.input_filter_tolerance),
            ("min_polygon_area", self.min_polygon_area),
            ("min_polygon_offset", self.min_polygon_offset),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(Error::Config(format!("{} must be a finite non-negative number, got {}", name, value)));
            }
        }
        if !(self.voronoi_sample_spacing > 0.0 && self.voronoi_sample_spacing.is_finite()) {
            return Err(Error::Config(format!(
                "voronoi_sample_spacing must be positive, got {}",
                self.voronoi_sample_spacing
            )));
        }
        Ok(())
    }

    // === Builder methods ===

    pub fn with_num_extruders(mut self, num_extruders: usize) -> Self {
        self.num_extruders = num_extruders;
        self
    }

    pub fn with_max_width(mut self, max_width: CoordF) -> Self {
        self.max_width = max_width;
        self
    }

    pub fn with_interlocking_depth(mut self, depth: CoordF) -> Self {
        self.interlocking_depth = depth;
        self
    }

    pub fn with_top_and_bottom(mut self, enabled: bool) -> Self {
        self.include_top_and_bottom = enabled;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

/// Settings of one print region, as seen by the segmentation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Extruder printing the perimeters of this region (1-based, 0 = default).
    pub perimeter_extruder: usize,
    /// Perimeter extrusion width (mm).
    pub perimeter_extrusion_width: CoordF,
    /// External perimeter extrusion width (mm).
    pub external_perimeter_extrusion_width: CoordF,
    /// Number of solid layers below a top surface, including the top layer itself.
    pub top_solid_layers: usize,
    /// Number of solid layers above a bottom surface, including the bottom layer itself.
    pub bottom_solid_layers: usize,
    /// Gap fill is enabled for this region.
    pub gap_fill_enabled: bool,
    /// Gap fill speed (mm/s); zero disables gap fill like `gap_fill_enabled = false`.
    pub gap_fill_speed: CoordF,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            perimeter_extruder: 1,
            perimeter_extrusion_width: 0.45,
            external_perimeter_extrusion_width: 0.45,
            top_solid_layers: 3,
            bottom_solid_layers: 3,
            gap_fill_enabled: true,
            gap_fill_speed: 20.0,
        }
    }
}

impl RegionConfig {
    /// Gap fill actually produces extrusions.
    #[inline]
    pub fn gap_fill_active(&self) -> bool {
        self.gap_fill_enabled && self.gap_fill_speed > 0.0
    }

    pub fn with_perimeter_extruder(mut self, extruder: usize) -> Self {
        self.perimeter_extruder = extruder;
        self
    }

    pub fn with_solid_layers(mut self, top: usize, bottom: usize) -> Self {
        self.top_solid_layers = top;
        self.bottom_solid_layers = bottom;
        self
    }

    pub fn with_perimeter_extrusion_width(mut self, width: CoordF) -> Self {
        self.perimeter_extrusion_width = width;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SegmentationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_facet_states(), 5);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = SegmentationConfig::from_json(r#"{"num_extruders": 2, "max_width": 3.0}"#)
            .expect("valid json");
        assert_eq!(config.num_extruders, 2);
        assert_eq!(config.max_width, 3.0);
        assert_eq!(config.max_projection_distance, 0.4);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = SegmentationConfig::default().with_num_extruders(0);
        assert!(matches!(zero.validate(), Err(Error::Config(_))));

        let negative = SegmentationConfig::default().with_max_width(-1.0);
        assert!(matches!(negative.validate(), Err(Error::Config(_))));

        let bad_json = SegmentationConfig::from_json("{ not json");
        assert!(matches!(bad_json, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_gap_fill_active() {
        let mut region = RegionConfig::default();
        assert!(region.gap_fill_active());
        region.gap_fill_speed = 0.0;
        assert!(!region.gap_fill_active());
    }
}
