//! Geomorphic attributes: reach elevations, length, slope, drainage area.
use std::collections::BTreeMap;

use tracing::{debug, info};

use super::buffers::{vertex_buffers, Vertex};
use crate::config::BratConfig;
use crate::error::Result;
use crate::hydraulic::drainage_area_km2;
use crate::network::{AttrValue, Network, ReachId};
use crate::raster::Raster;
use crate::zonal::{Aggregator, StatKind, ZonalPrimitive};

pub const EL_MAX: &str = "iGeo_ElMax";
pub const EL_MIN: &str = "iGeo_ElMin";
pub const LENGTH: &str = "iGeo_Len";
pub const SLOPE: &str = "iGeo_Slope";
pub const DRAINAGE_AREA: &str = "iGeo_DA";

pub const FIELDS: [&str; 5] = [EL_MAX, EL_MIN, LENGTH, SLOPE, DRAINAGE_AREA];

/// Write the `iGeo_*` fields onto `network`.
///
/// `drainage_area` is a km² raster; when absent it is derived from the
/// smoothed DEM. Returns the drainage-area raster that was used.
pub fn geomorphic_attributes<P: ZonalPrimitive + ?Sized>(
    network: &mut Network,
    dem: &Raster,
    drainage_area: Option<&Raster>,
    config: &BratConfig,
    aggregator: &Aggregator<'_, P>,
) -> Result<Raster> {
    info!("adding iGeo attributes");
    network.drop_fields(&FIELDS);

    debug!("smoothing DEM with 3x3 focal mean");
    let smoothed = dem.focal_mean_3x3()?;
    let q = config.buffer_quadrant_segments;

    for (vertex, field) in [(Vertex::Start, EL_MAX), (Vertex::End, EL_MIN)] {
        let zones = vertex_buffers(network, vertex, config.vertex_buffer_m, q)?;
        aggregator.aggregate_into(network, &zones, &smoothed, StatKind::Min, field)?;
    }

    network.add_field(LENGTH);
    network.add_field(SLOPE);
    for seg in &mut network.segments {
        let len = seg.length();
        let slope = match (seg.get_f64(EL_MAX), seg.get_f64(EL_MIN)) {
            (Some(hi), Some(lo)) if len > 0.0 => ((hi - lo).abs() / len).max(config.min_slope),
            _ => config.min_slope,
        };
        seg.attributes.insert(LENGTH.into(), AttrValue::Float(len));
        seg.attributes.insert(SLOPE.into(), AttrValue::Float(slope));
    }

    let da = match drainage_area {
        Some(supplied) => {
            supplied.validate()?;
            debug!(raster = %supplied.name, "using supplied drainage area");
            supplied.clone()
        }
        None => {
            info!("calculating drainage area");
            drainage_area_km2(&smoothed)?
        }
    };
    let zones = vertex_buffers(network, Vertex::Mid, config.midpoint_buffer_m, q)?;
    let agg = aggregator.aggregate(&zones, &da, StatKind::Max, DRAINAGE_AREA)?;
    let floored: BTreeMap<ReachId, f64> =
        agg.values.into_iter().map(|(id, v)| (id, v.max(config.min_drainage_area_km2))).collect();
    network.join_values(DRAINAGE_AREA, &floored).warn_missing(DRAINAGE_AREA);
    Ok(da)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ensure_reach_id, Segment, SpatialReference};
    use crate::zonal::RasterizedZonal;
    use approx::assert_relative_eq;
    use geo::line_string;

    /// Plane falling 0.1 m per metre toward +x, 5 m cells.
    fn plane() -> Raster {
        let mut r = Raster::new("dem", 80, 30, 0.0, 0.0, 5.0, SpatialReference::projected("UTM"), 0.0);
        for row in 0..r.height {
            for col in 0..r.width {
                let x = r.cell_center(row, col).x;
                r.set(row, col, (1000.0 - 0.1 * x) as f32);
            }
        }
        r
    }

    fn network(lines: Vec<geo::LineString<f64>>) -> Network {
        let segs = lines.into_iter().enumerate().map(|(i, l)| Segment::new(i, l)).collect();
        let mut n = Network::new("n", SpatialReference::projected("UTM"), segs);
        ensure_reach_id(&mut n);
        n
    }

    #[test]
    fn downhill_reach_gets_positive_slope_and_floored_drainage_area() {
        let mut n = network(vec![line_string![(x: 100.0, y: 75.0), (x: 300.0, y: 75.0)]]);
        let cfg = BratConfig::default();
        let agg = Aggregator::from_config(&RasterizedZonal, &cfg);
        geomorphic_attributes(&mut n, &plane(), None, &cfg, &agg).unwrap();
        let seg = &n.segments[0];
        assert_relative_eq!(seg.get_f64(LENGTH).unwrap(), 200.0, epsilon = 1e-9);
        let hi = seg.get_f64(EL_MAX).unwrap();
        let lo = seg.get_f64(EL_MIN).unwrap();
        assert!(hi > lo, "start should sit higher than end: {hi} vs {lo}");
        let slope = seg.get_f64(SLOPE).unwrap();
        assert!(slope > 0.05 && slope < 0.15, "slope {slope} should be near 0.1");
        assert!(seg.get_f64(DRAINAGE_AREA).unwrap() >= cfg.min_drainage_area_km2);
    }

    #[test]
    fn flat_reach_is_floored_and_zero_drainage_area_is_lifted() {
        let flat = Raster::new("dem", 40, 40, 0.0, 0.0, 5.0, SpatialReference::projected("UTM"), 50.0);
        let zero_da = flat.with_data("da", vec![0.0; flat.data.len()]).unwrap();
        let mut n = network(vec![line_string![(x: 50.0, y: 100.0), (x: 150.0, y: 100.0)]]);
        let cfg = BratConfig::default();
        let agg = Aggregator::from_config(&RasterizedZonal, &cfg);
        let da = geomorphic_attributes(&mut n, &flat, Some(&zero_da), &cfg, &agg).unwrap();
        assert_eq!(da.name, "da");
        assert_eq!(n.segments[0].get_f64(SLOPE), Some(0.0001));
        assert_eq!(n.segments[0].get_f64(DRAINAGE_AREA), Some(1e-8));
    }

    #[test]
    fn truncated_dem_is_an_error_not_a_panic() {
        let mut dem = Raster::new("dem", 40, 40, 0.0, 0.0, 5.0, SpatialReference::projected("UTM"), 50.0);
        dem.data.truncate(100);
        let mut n = network(vec![line_string![(x: 50.0, y: 100.0), (x: 150.0, y: 100.0)]]);
        let cfg = BratConfig::default();
        let agg = Aggregator::from_config(&RasterizedZonal, &cfg);
        let err = geomorphic_attributes(&mut n, &dem, None, &cfg, &agg).unwrap_err();
        assert!(matches!(err, crate::error::BratError::InvalidRaster { .. }), "{err}");
    }

    #[test]
    fn rerun_replaces_previous_values() {
        let mut n = network(vec![line_string![(x: 100.0, y: 75.0), (x: 300.0, y: 75.0)]]);
        n.fill_field(SLOPE, AttrValue::Text("stale".into()));
        let cfg = BratConfig::default();
        let agg = Aggregator::from_config(&RasterizedZonal, &cfg);
        geomorphic_attributes(&mut n, &plane(), None, &cfg, &agg).unwrap();
        assert!(n.segments[0].get_f64(SLOPE).is_some());
    }
}
