//! MM segmentation CLI
//!
//! Usage:
//!   mmseg-cli segment <scene.json> -o <regions.json> [options]
//!   mmseg-cli segment <scene.json> --fuzzy-skin
//!   mmseg-cli info <scene.json>

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use mm_segmentation::clipper::{total_area_mm2, union_ex};
use mm_segmentation::mesh::slicer::slice_outlines;
use mm_segmentation::segmentation::{fuzzy_skin_segmentation_by_painting, multi_material_segmentation_by_painting};
use mm_segmentation::{
    CancelToken, CoordF, ExPolygons, Layer, LayerRegion, PaintedObject, RegionConfig, SegmentationConfig,
    SegmentationResult,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Multi-material paint segmentation of sliced layers
#[derive(Parser, Debug)]
#[command(name = "mmseg-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Segment a painted scene into per-extruder regions
    Segment {
        /// Scene file (JSON)
        #[arg(value_name = "SCENE")]
        input: PathBuf,

        /// Output file (JSON), defaults to <SCENE>.regions.json
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Segmentation config file (JSON), replaces the scene's settings
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Maximum width of painted regions in mm (0 = unlimited)
        #[arg(long)]
        max_width: Option<f64>,

        /// Interlocking depth in mm (0 = off)
        #[arg(long)]
        interlocking_depth: Option<f64>,

        /// Do not propagate painted top and bottom surfaces
        #[arg(long)]
        no_top_bottom: bool,

        /// Segment fuzzy skin paint instead of multi-material paint
        #[arg(long)]
        fuzzy_skin: bool,

        /// Number of worker threads (0 = auto)
        #[arg(short = 'j', long, default_value = "0")]
        threads: usize,
    },

    /// Show information about a scene
    Info {
        /// Scene file (JSON)
        #[arg(value_name = "SCENE")]
        input: PathBuf,
    },
}

/// Input scene: a painted object plus the slicing settings.
#[derive(Debug, Deserialize)]
struct Scene {
    object: PaintedObject,
    #[serde(default = "default_layer_height")]
    layer_height: CoordF,
    #[serde(default)]
    first_layer_height: Option<CoordF>,
    #[serde(default)]
    region: RegionConfig,
    #[serde(default)]
    segmentation: SegmentationConfig,
}

fn default_layer_height() -> CoordF {
    0.2
}

impl Scene {
    fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let scene: Scene = serde_json::from_str(&text).context("Failed to parse scene")?;
        scene.object.validate().context("Invalid painted object")?;
        if scene.layer_height <= 0.0 {
            bail!("layer_height must be positive, got {}", scene.layer_height);
        }
        Ok(scene)
    }

    /// Slice the model parts into layers with a single region each.
    fn slice_layers(&self) -> Vec<Layer> {
        let Some((min_z, max_z)) = self
            .object
            .model_parts()
            .filter_map(|v| v.mesh.z_range())
            .reduce(|a, b| (a.0.min(b.0), a.1.max(b.1)))
        else {
            return Vec::new();
        };

        let first = self.first_layer_height.unwrap_or(self.layer_height).max(1e-3);
        let mut layers = Vec::new();
        let mut print_z = min_z + first;
        let mut height = first;
        while print_z - 0.5 * height < max_z {
            layers.push(Layer::new(layers.len(), print_z, height));
            height = self.layer_height;
            print_z += height;
        }

        let zs: Vec<CoordF> = layers.iter().map(|l| l.slice_z).collect();
        let mut outlines: Vec<ExPolygons> = vec![Vec::new(); layers.len()];
        for volume in self.object.model_parts() {
            for (outline, sliced) in outlines.iter_mut().zip(slice_outlines(&volume.mesh, &zs)) {
                outline.extend(sliced);
            }
        }
        for (layer, outline) in layers.iter_mut().zip(outlines) {
            let outline = union_ex(&outline);
            if !outline.is_empty() {
                layer.add_region(LayerRegion::from_expolygons(self.region.clone(), outline));
            }
        }
        layers
    }
}

#[derive(Serialize)]
struct RegionOutput {
    color: usize,
    area_mm2: f64,
    expolygons: ExPolygons,
}

#[derive(Serialize)]
struct LayerOutput {
    index: usize,
    print_z: f64,
    regions: Vec<RegionOutput>,
}

fn build_output(layers: &[Layer], result: SegmentationResult) -> Vec<LayerOutput> {
    layers
        .iter()
        .zip(result.layers)
        .map(|(layer, segmented)| {
            let default = std::iter::once((0, segmented.default_region));
            let painted = segmented.regions.into_iter().enumerate().map(|(i, r)| (i + 1, r));
            LayerOutput {
                index: layer.id,
                print_z: layer.print_z,
                regions: default
                    .chain(painted)
                    .filter(|(_, r)| !r.is_empty())
                    .map(|(color, expolygons)| RegionOutput {
                        color,
                        area_mm2: total_area_mm2(&expolygons),
                        expolygons,
                    })
                    .collect(),
            }
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Segment {
            input,
            output,
            config,
            max_width,
            interlocking_depth,
            no_top_bottom,
            fuzzy_skin,
            threads,
        } => cmd_segment(
            input,
            output,
            config,
            max_width,
            interlocking_depth,
            no_top_bottom,
            fuzzy_skin,
            threads,
        ),
        Commands::Info { input } => cmd_info(input),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_segment(
    input: PathBuf,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    max_width: Option<f64>,
    interlocking_depth: Option<f64>,
    no_top_bottom: bool,
    fuzzy_skin: bool,
    threads: usize,
) -> Result<()> {
    info!("Loading scene: {}", input.display());
    let scene = Scene::load(&input)?;
    let output_path = output.unwrap_or_else(|| input.with_extension("regions.json"));

    let mut config = match config_path {
        Some(path) => SegmentationConfig::from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => scene.segmentation.clone(),
    };
    if let Some(width) = max_width {
        config = config.with_max_width(width);
    }
    if let Some(depth) = interlocking_depth {
        config = config.with_interlocking_depth(depth);
    }
    if no_top_bottom {
        config = config.with_top_and_bottom(false);
    }
    if threads > 0 {
        config = config.with_threads(threads);
    }
    config.validate().context("Invalid segmentation config")?;

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    progress.enable_steady_tick(Duration::from_millis(100));

    progress.set_message("Slicing outlines...");
    let layers = scene.slice_layers();
    info!("Sliced {} layers", layers.len());
    if layers.is_empty() {
        warn!("Scene has no model parts to segment");
    }

    progress.set_message("Segmenting...");
    let cancel = CancelToken::new();
    let result = if fuzzy_skin {
        fuzzy_skin_segmentation_by_painting(&scene.object, &layers, &config, &cancel)
    } else {
        multi_material_segmentation_by_painting(&scene.object, &layers, &config, &cancel)
    }
    .context("Segmentation failed")?;

    let painted_layers = result.layers.iter().filter(|l| l.is_painted()).count();
    let output = build_output(&layers, result);

    progress.set_message("Writing output...");
    let json = serde_json::to_string_pretty(&output).context("Failed to serialize regions")?;
    fs::write(&output_path, json).with_context(|| format!("Failed to write {}", output_path.display()))?;
    progress.finish_with_message("Done");

    println!("Segmentation complete:");
    println!("  Layers: {}", output.len());
    println!("  Layers with painted regions: {}", painted_layers);
    println!("  Output: {}", output_path.display());
    Ok(())
}

fn cmd_info(input: PathBuf) -> Result<()> {
    let scene = Scene::load(&input)?;

    println!("Scene Information:");
    println!("  File: {}", input.display());
    println!("  Volumes: {}", scene.object.volumes.len());
    for (idx, volume) in scene.object.volumes.iter().enumerate() {
        let kind = if volume.is_model_part { "model part" } else { "modifier" };
        println!("  Volume {} ({}):", idx, kind);
        println!("    Triangles: {}", volume.mesh.triangle_count());
        if let Some((min_z, max_z)) = volume.mesh.z_range() {
            println!("    Z range: {:.3} - {:.3} mm", min_z, max_z);
        }
        if let Some(extruder) = volume.extruder_id {
            println!("    Extruder: {}", extruder);
        }

        let mut counts = vec![0usize; scene.segmentation.num_facet_states()];
        for &state in &volume.mm_colors {
            if let Some(count) = counts.get_mut(state as usize) {
                *count += 1;
            }
        }
        if volume.is_mm_painted() {
            println!("    Paint states:");
            for (state, count) in counts.iter().enumerate().filter(|(_, c)| **c > 0) {
                println!("      {}: {} faces", state, count);
            }
        } else {
            println!("    Paint: none");
        }
        let fuzzy = volume.fuzzy_skin.iter().filter(|&&f| f != 0).count();
        if fuzzy > 0 {
            println!("    Fuzzy skin: {} faces", fuzzy);
        }
    }
    println!("  Layer height: {:.3} mm", scene.layer_height);
    println!("  Layers: {}", scene.slice_layers().len());
    Ok(())
}
