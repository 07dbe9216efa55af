//! Configuration module.
//!
//! Object-wide segmentation settings and the per print region settings
//! consumed from the print configuration.

mod segmentation_config;

pub use segmentation_config::{RegionConfig, SegmentationConfig};
