//! Hydrology on a DEM: depression fill → D8 routing → accumulation →
//! drainage area.
pub mod fill;
pub mod flow_routing;

use tracing::debug;

use crate::error::Result;
use crate::raster::Raster;
use fill::fill_depressions;
use flow_routing::compute_d8_flow;

pub use fill::FilledDem;
pub use flow_routing::{FlowField, D8_DIST, D8_OFFSETS};

const SQ_M_PER_SQ_KM: f64 = 1_000_000.0;

/// Accumulation as a raster on the grid of `like`; nodata where `like` is.
pub fn accumulation_raster(flow: &FlowField, like: &Raster) -> Result<Raster> {
    let data = flow
        .accumulation
        .iter()
        .zip(&like.data)
        .map(|(&a, &z)| if z.is_nan() { f32::NAN } else { a as f32 })
        .collect();
    like.with_data("flow_accumulation", data)
}

/// Drainage area in km² for every cell of `dem`.
///
/// Fills depressions, routes D8 flow, and scales the upstream cell count by
/// the cell area.
pub fn drainage_area_km2(dem: &Raster) -> Result<Raster> {
    let filled = fill_depressions(dem)?;
    let flow = compute_d8_flow(&filled);
    let acc = accumulation_raster(&flow, dem)?;
    let scale = dem.cell_area() / SQ_M_PER_SQ_KM;
    let data = acc.data.iter().map(|&a| (a as f64 * scale) as f32).collect();
    debug!(max_cells = acc.max_value(), "computed drainage area");
    dem.with_data("DrainArea_sqkm", data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SpatialReference;

    /// V-valley draining south (row 0) along the centre column.
    fn make_valley(rows: usize, cols: usize) -> Raster {
        let center = cols / 2;
        let mut r = Raster::new("dem", cols, rows, 0.0, 0.0, 10.0, SpatialReference::projected("UTM"), 0.0);
        for row in 0..rows {
            for col in 0..cols {
                let dist = (col as isize - center as isize).unsigned_abs() as f32;
                r.set(row, col, dist * 10.0 + row as f32 * 5.0 + 100.0);
            }
        }
        r
    }

    #[test]
    fn valley_outlet_collects_most_of_the_grid() {
        let dem = make_valley(12, 9);
        let da = drainage_area_km2(&dem).unwrap();
        let outlet = da.get(0, 4);
        // 10 m cells: 1e-4 km² each.
        assert!(outlet > 50.0 * 1e-4, "outlet drainage area too small: {outlet}");
        assert_eq!(da.get(11, 0), 0.0, "corner ridge cell has no upstream area");
    }

    #[test]
    fn nodata_stays_nodata() {
        let mut dem = make_valley(6, 5);
        dem.set(3, 0, f32::NAN);
        let da = drainage_area_km2(&dem).unwrap();
        assert!(da.get(3, 0).is_nan());
        assert!(da.data.iter().filter(|v| !v.is_nan()).all(|&v| v >= 0.0));
    }
}
