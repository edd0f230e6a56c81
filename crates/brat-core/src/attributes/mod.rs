//! Attribute table pipeline: identity → segmentation → buffers → iGeo →
//! iVeg → iPC → braids → checks.
pub mod buffers;
pub mod conflict;
pub mod geomorphic;
pub mod vegetation;

use std::path::PathBuf;

use tracing::info;

use crate::braids::{handle_braids, BraidDelegate};
use crate::config::BratConfig;
use crate::error::Result;
use crate::gis::{LineLayer, PolygonLayer};
use crate::network::{ensure_reach_id, verify_unique_reach_ids, Network};
use crate::raster::{CategoricalRaster, Raster};
use crate::segmentation::segment_by_features;
use crate::validate::validate_inputs;
use crate::zonal::{Aggregator, ZonalPrimitive, Zone};

use buffers::NetworkBuffers;
use conflict::{conflict_attributes, ConflictLayers};
use geomorphic::geomorphic_attributes;
use vegetation::vegetation_attributes;

/// Everything one run reads.
pub struct PipelineInputs {
    pub network: Network,
    pub dem: Raster,
    /// Drainage area in km²; derived from the DEM when absent.
    pub drainage_area: Option<Raster>,
    pub existing_veg: CategoricalRaster,
    pub historic_veg: CategoricalRaster,
    pub valley_bottom: Option<PolygonLayer>,
    pub roads: Option<LineLayer>,
    pub railroads: Option<LineLayer>,
    pub canals: Option<LineLayer>,
    pub land_use: Option<CategoricalRaster>,
}

/// Attributed network plus the intermediates worth keeping.
#[derive(Debug)]
pub struct PipelineOutput {
    pub network: Network,
    pub buffer_small: Vec<Zone>,
    pub buffer_large: Vec<Zone>,
    pub drainage_area: Raster,
}

pub struct Pipeline<'a> {
    pub config: &'a BratConfig,
    pub zonal: &'a dyn ZonalPrimitive,
    pub braids: &'a dyn BraidDelegate,
    /// Working directory handed to the braid delegate.
    pub scratch: PathBuf,
}

impl<'a> Pipeline<'a> {
    pub fn run(&self, inputs: PipelineInputs) -> Result<PipelineOutput> {
        let config = self.config;
        validate_inputs(
            &inputs.network,
            &inputs.dem.spatial_reference,
            inputs.roads.as_ref(),
            inputs.railroads.as_ref(),
            inputs.canals.as_ref(),
        )?;

        let mut network = match (&inputs.roads, config.segment_network) {
            (Some(roads), true) => segment_by_features(&inputs.network, roads, config.route_tolerance_m)?,
            _ => inputs.network.clone(),
        };
        ensure_reach_id(&mut network);

        info!("making buffers");
        let q = config.buffer_quadrant_segments;
        let buffers = NetworkBuffers::build(&network, config.buffer_small_m, config.buffer_large_m, q)?;
        let aggregator = Aggregator::from_config(self.zonal, config);

        let drainage_area =
            geomorphic_attributes(&mut network, &inputs.dem, inputs.drainage_area.as_ref(), config, &aggregator)?;
        vegetation_attributes(&mut network, &inputs.existing_veg, &inputs.historic_veg, &buffers, &aggregator)?;

        if let (Some(roads), Some(valley_bottom)) = (&inputs.roads, &inputs.valley_bottom) {
            let layers = ConflictLayers {
                roads,
                valley_bottom,
                railroads: inputs.railroads.as_ref(),
                canals: inputs.canals.as_ref(),
                land_use: inputs.land_use.as_ref(),
            };
            conflict_attributes(&mut network, &layers, &buffers, config, &aggregator)?;
        } else {
            info!("roads or valley bottom not supplied; skipping iPC attributes");
        }

        handle_braids(&mut network, inputs.canals.as_ref(), &self.scratch, config.find_clusters, self.braids)?;

        verify_unique_reach_ids(&network)?;
        info!(segments = network.len(), "attribute table complete");
        Ok(PipelineOutput { network, buffer_small: buffers.small, buffer_large: buffers.large, drainage_area })
    }
}
