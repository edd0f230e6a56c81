//! Vegetation attributes: mean coded vegetation value near each reach.
use tracing::{debug, info};

use super::buffers::NetworkBuffers;
use crate::error::Result;
use crate::network::Network;
use crate::raster::CategoricalRaster;
use crate::zonal::{Aggregator, StatKind, ZonalPrimitive};

pub const VEG_CODE: &str = "VEG_CODE";

pub const EXISTING_100: &str = "iVeg_100EX";
pub const EXISTING_30: &str = "iVeg_30EX";
pub const HISTORIC_100: &str = "iVeg_100PT";
pub const HISTORIC_30: &str = "iVeg_30PT";

pub const FIELDS: [&str; 4] = [EXISTING_100, EXISTING_30, HISTORIC_100, HISTORIC_30];

/// Write the `iVeg_*` fields from existing and historic vegetation rasters.
pub fn vegetation_attributes<P: ZonalPrimitive + ?Sized>(
    network: &mut Network,
    existing: &CategoricalRaster,
    historic: &CategoricalRaster,
    buffers: &NetworkBuffers,
    aggregator: &Aggregator<'_, P>,
) -> Result<()> {
    info!("adding iVeg attributes");
    network.drop_fields(&FIELDS);

    for (veg, large_field, small_field) in
        [(existing, EXISTING_100, EXISTING_30), (historic, HISTORIC_100, HISTORIC_30)]
    {
        debug!(raster = %veg.raster.name, "making vegetation lookup raster");
        let coded = veg.lookup(VEG_CODE)?;
        aggregator.aggregate_into(network, &buffers.large, &coded, StatKind::Mean, large_field)?;
        aggregator.aggregate_into(network, &buffers.small, &coded, StatKind::Mean, small_field)?;
    }
    Ok(())
}
