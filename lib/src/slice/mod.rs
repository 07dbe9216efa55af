//! Sliced layer input.
//!
//! This module contains the per-layer data the segmentation consumes:
//! - [`Layer`] - One horizontal slice with its heights and regions
//! - [`LayerRegion`] - Slices printed with one region configuration
//! - [`Surface`] - A classified ExPolygon

mod layer;
mod surface;

pub use layer::{Layer, LayerRegion};
pub use surface::{Surface, SurfaceType};
