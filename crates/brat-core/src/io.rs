//! File formats: GeoJSON vector layers and JSON rasters.
//!
//! The spatial reference of a vector layer travels in a top-level `crs`
//! member, `{"name": "...", "projected": true}`. A layer without one reads
//! as geographic and fails projection checks.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use geo::{Geometry, LineString, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BratError, Result};
use crate::gis::{LineLayer, PolygonLayer};
use crate::network::{AttrValue, Network, Segment, SpatialReference};
use crate::zonal::Zone;

const CRS: &str = "crs";
const UNDEFINED_CRS: &str = "undefined";

fn layer_name(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("layer").to_string()
}

fn read_collection(path: &Path) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path)?;
    let gj: GeoJson = text.parse()?;
    Ok(FeatureCollection::try_from(gj)?)
}

fn spatial_reference(fc: &FeatureCollection) -> SpatialReference {
    fc.foreign_members
        .as_ref()
        .and_then(|m| m.get(CRS))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_else(|| SpatialReference::geographic(UNDEFINED_CRS))
}

fn crs_member(sr: &SpatialReference) -> Result<JsonObject> {
    let mut members = JsonObject::new();
    members.insert(CRS.to_string(), serde_json::to_value(sr)?);
    Ok(members)
}

fn geometry_of(feature: &Feature) -> Result<Option<Geometry<f64>>> {
    match &feature.geometry {
        Some(g) => Ok(Some(Geometry::<f64>::try_from(g.clone())?)),
        None => Ok(None),
    }
}

fn attr_from_json(v: &JsonValue) -> Option<AttrValue> {
    match v {
        JsonValue::Number(n) => n.as_i64().map(AttrValue::Int).or_else(|| n.as_f64().map(AttrValue::Float)),
        JsonValue::String(s) => Some(AttrValue::Text(s.clone())),
        JsonValue::Bool(b) => Some(AttrValue::Int(i64::from(*b))),
        _ => None,
    }
}

fn attr_to_json(v: &AttrValue) -> JsonValue {
    match v {
        AttrValue::Int(i) => JsonValue::from(*i),
        // NaN and infinities have no JSON number form.
        AttrValue::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        AttrValue::Text(s) => JsonValue::from(s.clone()),
    }
}

/// Stream network from a GeoJSON file of single-part lines, one segment per
/// feature in file order.
pub fn read_network(path: &Path) -> Result<Network> {
    let fc = read_collection(path)?;
    let sr = spatial_reference(&fc);
    let mut segments = Vec::with_capacity(fc.features.len());
    for (fid, feature) in fc.features.iter().enumerate() {
        let geometry = match geometry_of(feature)? {
            Some(Geometry::LineString(l)) => l,
            Some(Geometry::MultiLineString(mut m)) if m.0.len() == 1 => m.0.remove(0),
            _ => {
                return Err(BratError::InvalidGeometry { fid, reason: "expected a single-part line".into() });
            }
        };
        let mut seg = Segment::new(fid, geometry);
        for (k, v) in feature.properties.iter().flatten() {
            if let Some(a) = attr_from_json(v) {
                seg.attributes.insert(k.clone(), a);
            }
        }
        segments.push(seg);
    }
    Ok(Network::new(layer_name(path), sr, segments))
}

/// Line layer with multi-part features exploded.
pub fn read_line_layer(path: &Path) -> Result<LineLayer> {
    let fc = read_collection(path)?;
    let sr = spatial_reference(&fc);
    let mut lines: Vec<LineString<f64>> = Vec::new();
    for feature in &fc.features {
        match geometry_of(feature)? {
            Some(Geometry::LineString(l)) => lines.push(l),
            Some(Geometry::MultiLineString(m)) => lines.extend(m.0),
            _ => {}
        }
    }
    lines.retain(|l| l.0.len() >= 2);
    Ok(LineLayer::new(layer_name(path), sr, lines))
}

pub fn read_polygon_layer(path: &Path) -> Result<PolygonLayer> {
    let fc = read_collection(path)?;
    let sr = spatial_reference(&fc);
    let mut polygons = Vec::new();
    for feature in &fc.features {
        match geometry_of(feature)? {
            Some(Geometry::Polygon(p)) => polygons.push(p),
            Some(Geometry::MultiPolygon(m)) => polygons.extend(m.0),
            _ => {}
        }
    }
    Ok(PolygonLayer { name: layer_name(path), spatial_reference: sr, polygons: MultiPolygon::new(polygons) })
}

pub fn network_to_geojson(network: &Network) -> Result<FeatureCollection> {
    let features = network
        .segments
        .iter()
        .map(|seg| {
            let properties: JsonObject = network
                .fields()
                .iter()
                .map(|f| (f.clone(), seg.attributes.get(f).map_or(JsonValue::Null, attr_to_json)))
                .collect();
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&seg.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    Ok(FeatureCollection { bbox: None, features, foreign_members: Some(crs_member(&network.spatial_reference)?) })
}

/// Buffer zones as polygons with a `ReachID` property.
pub fn zones_to_geojson(zones: &[Zone], sr: &SpatialReference) -> Result<FeatureCollection> {
    let features = zones
        .iter()
        .map(|z| {
            let mut properties = JsonObject::new();
            properties.insert(crate::network::REACH_ID.to_string(), JsonValue::from(z.id));
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&z.polygon))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    Ok(FeatureCollection { bbox: None, features, foreign_members: Some(crs_member(sr)?) })
}

pub fn write_geojson(path: &Path, fc: &FeatureCollection) -> Result<()> {
    write_json(path, fc)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
