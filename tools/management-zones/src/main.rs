/// Management zone tool: label every reach of a capacity/conflict-attributed
/// network with its restoration or conservation zone (`oPBRC`).

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use brat_core::classify::{apply_management_zones, MANAGEMENT_ZONE};
use brat_core::io::{network_to_geojson, read_network, write_geojson};
use brat_core::validate::require_network_format;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "management-zones", about = "Assign BRAT management zones to an attributed stream network")]
struct Args {
    /// Network GeoJSON carrying oCC_EX, oCC_PT, oPC_Score and land-use shares.
    #[arg(short, long)]
    input: PathBuf,

    /// Output name (without extension), written next to the input.
    #[arg(short, long, default_value = "BRAT_Management_Zones")]
    out_name: String,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    require_network_format(&args.input)?;
    let mut network =
        read_network(&args.input).with_context(|| format!("reading network {}", args.input.display()))?;
    apply_management_zones(&mut network);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for seg in &network.segments {
        if let Some(label) = seg.attributes.get(MANAGEMENT_ZONE).and_then(|v| v.as_str()) {
            *counts.entry(label).or_default() += 1;
        }
    }
    for (label, n) in &counts {
        info!(reaches = n, "{label}");
    }

    let out = args.input.with_file_name(format!("{}.geojson", args.out_name));
    write_geojson(&out, &network_to_geojson(&network)?).with_context(|| format!("writing {}", out.display()))?;
    info!(output = %out.display(), "done");
    Ok(())
}
