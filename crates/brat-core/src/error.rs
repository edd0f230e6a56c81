//! Library error type.
use thiserror::Error;

use crate::network::ReachId;

pub type Result<T> = std::result::Result<T, BratError>;

#[derive(Debug, Error)]
pub enum BratError {
    /// An input layer or raster is not in a projected coordinate system.
    #[error("input {input} must have a projected coordinate system (found '{found}')")]
    NotProjected { input: String, found: String },

    /// An input file is not in the format the pipeline reads.
    #[error("input {input} must be {expected}")]
    InvalidFormat { input: String, expected: String },

    /// A segment midpoint could not be located on any route of its stream.
    #[error("midpoint of ReachID {reach_id} could not be located on any route (StreamID {stream_id:?}); segmented and original networks disagree")]
    RouteLocation { reach_id: ReachId, stream_id: Option<i64> },

    #[error("segment {fid} has a degenerate geometry: {reason}")]
    InvalidGeometry { fid: usize, reason: String },

    #[error("invalid raster '{name}': {reason}")]
    InvalidRaster { name: String, reason: String },

    #[error("invalid zone set: {0}")]
    InvalidZones(String),

    #[error("lookup field '{field}' not found in attribute table of '{raster}'")]
    MissingLookupField { raster: String, field: String },

    #[error("segment {fid} has no ReachID; run identity assignment first")]
    MissingReachId { fid: usize },

    #[error("ReachID {0} is not unique in the output network")]
    DuplicateReachId(ReachId),

    #[error("braid delegate failed: {0}")]
    Delegate(String),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}
