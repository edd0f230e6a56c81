//! Build the BRAT attribute table for a stream network.
//!
//! Reads a JSON project manifest naming every input layer, runs the
//! attribute pipeline, and writes the attributed network, its buffers and
//! the drainage-area raster into a fresh `Output_N/01_Intermediates` folder
//! next to the manifest.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use brat_core::braids::SingleThreaded;
use brat_core::io::{
    network_to_geojson, read_json, read_line_layer, read_network, read_polygon_layer, write_geojson, write_json,
    zones_to_geojson,
};
use brat_core::raster::{CategoricalRaster, Raster};
use brat_core::validate::require_network_format;
use brat_core::zonal::RasterizedZonal;
use brat_core::{BratConfig, Pipeline, PipelineInputs};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "brat-table", about = "Attribute a stream network with BRAT geomorphic, vegetation and conflict indicators")]
struct Args {
    /// Project manifest (JSON) naming the input layers.
    #[arg(short, long)]
    manifest: PathBuf,

    /// Name of the output network (without extension).
    #[arg(short, long, default_value = "BRAT_Table")]
    out_name: String,

    /// Run configuration JSON; missing keys use defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Split the network where roads cross it.
    #[arg(long)]
    segment: bool,

    /// Assign braid cluster ids.
    #[arg(long)]
    find_clusters: bool,

    /// Log per-field progress.
    #[arg(short, long)]
    verbose: bool,
}

// ── Manifest ──────────────────────────────────────────────────────────────────

/// Input paths, relative to the manifest's directory.
#[derive(Deserialize, Debug)]
struct Manifest {
    network: PathBuf,
    dem: PathBuf,
    drainage_area: Option<PathBuf>,
    existing_veg: PathBuf,
    historic_veg: PathBuf,
    valley_bottom: Option<PathBuf>,
    roads: Option<PathBuf>,
    railroads: Option<PathBuf>,
    canals: Option<PathBuf>,
    land_use: Option<PathBuf>,
}

fn load<T>(base: &Path, rel: &Path, what: &str, read: impl Fn(&Path) -> brat_core::Result<T>) -> Result<T> {
    let path = base.join(rel);
    read(&path).with_context(|| format!("reading {what} from {}", path.display()))
}

fn load_opt<T>(
    base: &Path,
    rel: Option<&PathBuf>,
    what: &str,
    read: impl Fn(&Path) -> brat_core::Result<T>,
) -> Result<Option<T>> {
    rel.map(|r| load(base, r, what, read)).transpose()
}

/// First `Output_N` directory under `project` that does not exist yet.
fn next_output_folder(project: &Path) -> PathBuf {
    (1..)
        .map(|j| project.join(format!("Output_{j}")))
        .find(|p| !p.exists())
        .unwrap_or_else(|| project.join("Output"))
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config: BratConfig = match &args.config {
        Some(path) => read_json(path).with_context(|| format!("reading config {}", path.display()))?,
        None => BratConfig::default(),
    };
    config.segment_network |= args.segment;
    config.find_clusters |= args.find_clusters;

    let manifest: Manifest =
        read_json(&args.manifest).with_context(|| format!("reading manifest {}", args.manifest.display()))?;
    let project = args.manifest.parent().map(Path::to_path_buf).unwrap_or_default();

    let network_path = project.join(&manifest.network);
    require_network_format(&network_path)?;
    let inputs = PipelineInputs {
        network: load(&project, &manifest.network, "stream network", read_network)?,
        dem: load(&project, &manifest.dem, "DEM", read_json::<Raster>)?,
        drainage_area: load_opt(&project, manifest.drainage_area.as_ref(), "drainage area", read_json::<Raster>)?,
        existing_veg: load(&project, &manifest.existing_veg, "existing vegetation", read_json::<CategoricalRaster>)?,
        historic_veg: load(&project, &manifest.historic_veg, "historic vegetation", read_json::<CategoricalRaster>)?,
        valley_bottom: load_opt(&project, manifest.valley_bottom.as_ref(), "valley bottom", read_polygon_layer)?,
        roads: load_opt(&project, manifest.roads.as_ref(), "roads", read_line_layer)?,
        railroads: load_opt(&project, manifest.railroads.as_ref(), "railroads", read_line_layer)?,
        canals: load_opt(&project, manifest.canals.as_ref(), "canals", read_line_layer)?,
        land_use: load_opt(&project, manifest.land_use.as_ref(), "land use", read_json::<CategoricalRaster>)?,
    };

    let output = next_output_folder(&project);
    let intermediates = output.join("01_Intermediates");
    let buffers_dir = intermediates.join("01_Buffers");
    let scratch = project.join("Temp");
    for dir in [&buffers_dir, &scratch] {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    info!(folder = %output.display(), "building folder structure");

    let pipeline = Pipeline { config: &config, zonal: &RasterizedZonal, braids: &SingleThreaded, scratch };
    let result = pipeline.run(inputs)?;

    let sr = &result.network.spatial_reference;
    let out_network = intermediates.join(format!("{}.geojson", args.out_name));
    write_geojson(&out_network, &network_to_geojson(&result.network)?)
        .with_context(|| format!("writing {}", out_network.display()))?;
    for (zones, distance) in [(&result.buffer_small, config.buffer_small_m), (&result.buffer_large, config.buffer_large_m)] {
        let path = buffers_dir.join(format!("buffer_{distance}m.geojson"));
        write_geojson(&path, &zones_to_geojson(zones, sr)?).with_context(|| format!("writing {}", path.display()))?;
    }
    let da_path = intermediates.join("DrainArea_sqkm.json");
    write_json(&da_path, &result.drainage_area).with_context(|| format!("writing {}", da_path.display()))?;

    info!(network = %out_network.display(), "done");
    Ok(())
}
