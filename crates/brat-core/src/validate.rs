//! Input preconditions checked before any processing.
use std::path::Path;

use tracing::debug;

use crate::error::{BratError, Result};
use crate::gis::LineLayer;
use crate::network::{Network, SpatialReference};

/// Shortest segment length accepted as non-degenerate.
const MIN_SEGMENT_LENGTH: f64 = 1e-9;

/// Network file extensions the pipeline reads.
pub const NETWORK_EXTENSIONS: [&str; 2] = ["geojson", "json"];

/// Fails unless `path` names a GeoJSON file.
pub fn require_network_format(path: &Path) -> Result<()> {
    let ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| NETWORK_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)));
    if ok {
        Ok(())
    } else {
        Err(BratError::InvalidFormat { input: path.display().to_string(), expected: "a GeoJSON file (.geojson)".into() })
    }
}

/// Projected-CRS and geometry checks on the network and optional layers.
pub fn validate_inputs(
    network: &Network,
    dem: &SpatialReference,
    roads: Option<&LineLayer>,
    railroads: Option<&LineLayer>,
    canals: Option<&LineLayer>,
) -> Result<()> {
    debug!("validating inputs");
    network.spatial_reference.require_projected("stream network")?;
    dem.require_projected("DEM")?;
    for (layer, label) in [(roads, "roads"), (railroads, "railroads"), (canals, "canals")] {
        if let Some(layer) = layer {
            layer.spatial_reference.require_projected(label)?;
        }
    }
    for seg in &network.segments {
        if seg.geometry.0.len() < 2 {
            return Err(BratError::InvalidGeometry { fid: seg.fid, reason: "fewer than two vertices".into() });
        }
        if seg.length() <= MIN_SEGMENT_LENGTH {
            return Err(BratError::InvalidGeometry { fid: seg.fid, reason: "zero length".into() });
        }
    }
    Ok(())
}
