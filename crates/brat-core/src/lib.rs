//! Stream-network attribute table for beaver restoration assessment.
//!
//! Each reach of a stream network is attributed with geomorphic, vegetation
//! and conflict-potential indicators aggregated over buffer zones, then
//! placed in a restoration/conservation management zone.
pub mod attributes;
pub mod braids;
pub mod classify;
pub mod config;
pub mod error;
pub mod gis;
pub mod hydraulic;
pub mod io;
pub mod network;
pub mod raster;
pub mod routes;
pub mod segmentation;
pub mod validate;
pub mod zonal;

pub use attributes::{Pipeline, PipelineInputs, PipelineOutput};
pub use config::BratConfig;
pub use error::{BratError, Result};
pub use network::{Network, ReachId, Segment};
