//! Conflict-potential attributes: distance to road crossings, roads,
//! railroads and canals in the valley bottom, and land use intensity.
use std::collections::BTreeMap;

use geo::{Area, Geometry};
use tracing::{debug, info, warn};

use super::buffers::NetworkBuffers;
use crate::config::BratConfig;
use crate::error::Result;
use crate::gis::{clip_lines, crossing_points, euclidean_distance, raster_to_polygons, tabulate_intersection};
use crate::gis::{LineLayer, PolygonLayer};
use crate::network::{AttrValue, Network, ReachId};
use crate::raster::{CategoricalRaster, RasterEnv};
use crate::zonal::{Aggregator, StatKind, ZonalPrimitive, Zone};

pub const ROAD_CROSSING: &str = "iPC_RoadX";
pub const ROAD_ADJACENT: &str = "iPC_RoadAd";
pub const RAILROAD: &str = "iPC_RR";
pub const CANAL: &str = "iPC_Canal";
pub const LAND_USE: &str = "iPC_LU";

pub const VERY_LOW_LU: &str = "iPC_VLowLU";
pub const LOW_LU: &str = "iPC_LowLU";
pub const MODERATE_LU: &str = "iPC_ModLU";
pub const HIGH_LU: &str = "iPC_HighLU";

pub const FIELDS: [&str; 9] =
    [ROAD_CROSSING, ROAD_ADJACENT, RAILROAD, CANAL, LAND_USE, VERY_LOW_LU, LOW_LU, MODERATE_LU, HIGH_LU];

pub const LU_CODE: &str = "LU_CODE";
pub const LUI_CLASS: &str = "LUI_Class";

/// Land-use intensity class label → output field.
const LU_CLASSES: [(&str, &str); 4] =
    [("VeryLow", VERY_LOW_LU), ("Low", LOW_LU), ("Moderate", MODERATE_LU), ("High", HIGH_LU)];

/// Layers the conflict stage reads. Roads and valley bottom are required
/// for the stage to run at all.
pub struct ConflictLayers<'a> {
    pub roads: &'a LineLayer,
    pub valley_bottom: &'a PolygonLayer,
    pub railroads: Option<&'a LineLayer>,
    pub canals: Option<&'a LineLayer>,
    pub land_use: Option<&'a CategoricalRaster>,
}

/// Write the `iPC_*` fields.
pub fn conflict_attributes<P: ZonalPrimitive + ?Sized>(
    network: &mut Network,
    layers: &ConflictLayers<'_>,
    buffers: &NetworkBuffers,
    config: &BratConfig,
    aggregator: &Aggregator<'_, P>,
) -> Result<()> {
    info!("adding iPC attributes");
    network.drop_fields(&FIELDS);
    let Some(extent) = network.bounding_rect() else {
        return Ok(());
    };
    let env = RasterEnv::around(
        extent,
        config.extent_padding_m,
        config.distance_cell_size_m,
        network.spatial_reference.clone(),
    );

    road_crossing_distance(network, layers.roads, &buffers.small, &env, config, aggregator)?;

    let valley_features = [(Some(layers.roads), ROAD_ADJACENT), (layers.railroads, RAILROAD), (layers.canals, CANAL)];
    for (feature, field) in valley_features {
        let Some(feature) = feature else { continue };
        distance_from_feature(network, feature, layers.valley_bottom, &buffers.small, field, &env, config, aggregator)?;
    }

    if let Some(land_use) = layers.land_use {
        land_use_attributes(network, land_use, &buffers.large, aggregator)?;
    }
    Ok(())
}

/// `iPC_RoadX`: minimum distance to a road-stream crossing in the small buffer.
fn road_crossing_distance<P: ZonalPrimitive + ?Sized>(
    network: &mut Network,
    roads: &LineLayer,
    zones: &[Zone],
    env: &RasterEnv,
    config: &BratConfig,
    aggregator: &Aggregator<'_, P>,
) -> Result<()> {
    let lines: Vec<_> = network.segments.iter().map(|s| s.geometry.clone()).collect();
    let crossings = crossing_points(&lines, roads);
    debug!(count = crossings.len(), "road-stream crossings");
    if crossings.is_empty() {
        network.fill_field(ROAD_CROSSING, AttrValue::Float(config.no_conflict_distance));
        return Ok(());
    }
    let sources: Vec<Geometry<f64>> = crossings.into_iter().map(Geometry::Point).collect();
    let distance = euclidean_distance("roadx_distance", &sources, env);
    aggregator.aggregate_into(network, zones, &distance, StatKind::Min, ROAD_CROSSING)?;
    Ok(())
}

/// Mean distance to the parts of `feature` inside the valley bottom, or the
/// no-conflict distance when none are.
#[allow(clippy::too_many_arguments)]
fn distance_from_feature<P: ZonalPrimitive + ?Sized>(
    network: &mut Network,
    feature: &LineLayer,
    valley_bottom: &PolygonLayer,
    zones: &[Zone],
    field: &str,
    env: &RasterEnv,
    config: &BratConfig,
    aggregator: &Aggregator<'_, P>,
) -> Result<()> {
    debug!(field, feature = %feature.name, "finding distance values");
    let subset = clip_lines(feature, valley_bottom);
    if subset.is_empty() {
        network.fill_field(field, AttrValue::Float(config.no_conflict_distance));
        return Ok(());
    }
    let sources: Vec<Geometry<f64>> = subset.lines.into_iter().map(Geometry::LineString).collect();
    let distance = euclidean_distance(&format!("{}_distance", feature.name), &sources, env);
    aggregator.aggregate_into(network, zones, &distance, StatKind::Mean, field)?;
    Ok(())
}

fn land_use_attributes<P: ZonalPrimitive + ?Sized>(
    network: &mut Network,
    land_use: &CategoricalRaster,
    zones: &[Zone],
    aggregator: &Aggregator<'_, P>,
) -> Result<()> {
    let coded = land_use.lookup(LU_CODE)?;
    aggregator.aggregate_into(network, zones, &coded, StatKind::Mean, LAND_USE)?;

    if land_use.find_field(LUI_CLASS).is_none() {
        warn!(
            raster = %land_use.raster.name,
            "no field named \"{LUI_CLASS}\" in the land use raster; land use class percentages not written"
        );
        return Ok(());
    }
    let shares = land_use_class_shares(land_use, zones)?;
    for (_, field) in LU_CLASSES {
        network.add_field(field);
    }
    for seg in &mut network.segments {
        let Some(id) = seg.reach_id() else { continue };
        let row = shares.get(&id);
        for (class, field) in LU_CLASSES {
            let share = row.and_then(|r| r.get(class)).copied().unwrap_or(0.0);
            seg.attributes.insert(field.into(), AttrValue::Float(round2(100.0 * share)));
        }
    }
    Ok(())
}

/// Fraction of each zone's area falling in each `LUI_Class` label.
pub fn land_use_class_shares(
    land_use: &CategoricalRaster,
    zones: &[Zone],
) -> Result<BTreeMap<ReachId, BTreeMap<String, f64>>> {
    let classes = raster_to_polygons(land_use, LUI_CLASS)?;
    let zone_area: BTreeMap<ReachId, f64> = zones.iter().map(|z| (z.id, z.polygon.unsigned_area())).collect();
    let mut shares: BTreeMap<ReachId, BTreeMap<String, f64>> = BTreeMap::new();
    for hit in tabulate_intersection(zones, &classes) {
        let total = zone_area.get(&hit.id).copied().unwrap_or(0.0);
        if total <= 0.0 {
            continue;
        }
        *shares.entry(hit.id).or_default().entry(hit.class).or_insert(0.0) += hit.area / total;
    }
    Ok(shares)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ensure_reach_id, Segment, SpatialReference};
    use crate::raster::Raster;
    use crate::zonal::RasterizedZonal;
    use geo::{line_string, polygon, MultiPolygon};

    fn sr() -> SpatialReference {
        SpatialReference::projected("UTM")
    }

    fn network() -> Network {
        let segs = vec![
            Segment::new(0, line_string![(x: 0.0, y: 0.0), (x: 200.0, y: 0.0)]),
            Segment::new(1, line_string![(x: 200.0, y: 0.0), (x: 400.0, y: 0.0)]),
        ];
        let mut n = Network::new("n", sr(), segs);
        ensure_reach_id(&mut n);
        n
    }

    fn valley() -> PolygonLayer {
        PolygonLayer {
            name: "vb".into(),
            spatial_reference: sr(),
            polygons: MultiPolygon::new(vec![polygon![
                (x: -50.0, y: -60.0), (x: 450.0, y: -60.0), (x: 450.0, y: 60.0), (x: -50.0, y: 60.0)
            ]]),
        }
    }

    fn run(n: &mut Network, layers: &ConflictLayers<'_>) {
        let cfg = BratConfig::default();
        let buffers = NetworkBuffers::build(n, cfg.buffer_small_m, cfg.buffer_large_m, 8).unwrap();
        let agg = Aggregator::from_config(&RasterizedZonal, &cfg);
        conflict_attributes(n, layers, &buffers, &cfg, &agg).unwrap();
    }

    #[test]
    fn no_crossings_and_no_valley_roads_use_sentinel() {
        let mut n = network();
        let roads = LineLayer::new("roads", sr(), vec![line_string![(x: 0.0, y: 500.0), (x: 400.0, y: 500.0)]]);
        let vb = valley();
        run(&mut n, &ConflictLayers { roads: &roads, valley_bottom: &vb, railroads: None, canals: None, land_use: None });
        for seg in &n.segments {
            assert_eq!(seg.get_f64(ROAD_CROSSING), Some(10_000.0));
            assert_eq!(seg.get_f64(ROAD_ADJACENT), Some(10_000.0));
        }
        assert!(!n.has_field(RAILROAD), "absent railroads leave the field out");
        assert!(!n.has_field(LAND_USE));
    }

    #[test]
    fn crossing_reach_is_closer_than_its_neighbour() {
        let mut n = network();
        let roads = LineLayer::new("roads", sr(), vec![line_string![(x: 100.0, y: -300.0), (x: 100.0, y: 300.0)]]);
        let vb = valley();
        run(&mut n, &ConflictLayers { roads: &roads, valley_bottom: &vb, railroads: None, canals: None, land_use: None });
        let near = n.segments[0].get_f64(ROAD_CROSSING).unwrap();
        let far = n.segments[1].get_f64(ROAD_CROSSING).unwrap();
        assert!(near < 5.0, "crossing reach min distance {near}");
        assert!(far > 60.0, "downstream reach min distance {far}");
        assert!(n.segments[0].get_f64(ROAD_ADJACENT).unwrap() < n.segments[1].get_f64(ROAD_ADJACENT).unwrap());
    }

    #[test]
    fn land_use_shares_are_percentages_that_sum_to_at_most_100() {
        let mut n = network();
        let roads = LineLayer::new("roads", sr(), vec![]);
        let vb = valley();
        // West half High, east half Low.
        let mut grid = Raster::new("lu", 120, 60, -100.0, -150.0, 5.0, sr(), 2.0);
        for row in 0..grid.height {
            for col in 0..grid.width / 2 {
                grid.set(row, col, 1.0);
            }
        }
        let table = BTreeMap::from([
            (1, BTreeMap::from([("LU_CODE".to_string(), AttrValue::Float(0.0)), ("LUI_CLASS".to_string(), AttrValue::Text("High".into()))])),
            (2, BTreeMap::from([("LU_CODE".to_string(), AttrValue::Float(1.0)), ("LUI_CLASS".to_string(), AttrValue::Text("Low".into()))])),
        ]);
        let lu = CategoricalRaster { raster: grid, table };
        run(&mut n, &ConflictLayers { roads: &roads, valley_bottom: &vb, railroads: None, canals: None, land_use: Some(&lu) });
        for seg in &n.segments {
            let parts: Vec<f64> = [VERY_LOW_LU, LOW_LU, MODERATE_LU, HIGH_LU]
                .iter()
                .map(|f| seg.get_f64(f).unwrap())
                .collect();
            assert!(parts.iter().all(|p| (0.0..=100.0).contains(p)), "{parts:?}");
            let sum: f64 = parts.iter().sum();
            assert!(sum <= 100.0 + 0.02 && sum > 99.0, "shares sum to {sum}");
            assert_eq!(parts[0], 0.0, "absent class is zero");
        }
        // Reach 0 lies west of x = 200, reach 1 east of it.
        assert!(n.segments[0].get_f64(HIGH_LU).unwrap() > n.segments[0].get_f64(LOW_LU).unwrap());
        assert!(n.segments[1].get_f64(LOW_LU).unwrap() > n.segments[1].get_f64(HIGH_LU).unwrap());
    }

    #[test]
    fn missing_class_field_skips_percentages() {
        let mut n = network();
        let roads = LineLayer::new("roads", sr(), vec![]);
        let vb = valley();
        let grid = Raster::new("lu", 120, 60, -100.0, -150.0, 5.0, sr(), 1.0);
        let table = BTreeMap::from([(1, BTreeMap::from([("LU_CODE".to_string(), AttrValue::Float(0.5))]))]);
        let lu = CategoricalRaster { raster: grid, table };
        run(&mut n, &ConflictLayers { roads: &roads, valley_bottom: &vb, railroads: None, canals: None, land_use: Some(&lu) });
        assert_eq!(n.segments[0].get_f64(LAND_USE), Some(0.5));
        assert!(!n.has_field(HIGH_LU));
    }
}
