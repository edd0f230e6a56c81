//! Stream network model and segment identity.
//!
//! A `Network` is an ordered collection of `Segment`s plus a field schema. The
//! schema decides whether a field "exists"; values live on each segment. Every
//! derived attribute is joined back by `ReachID`, never by position.
use std::collections::{BTreeMap, HashSet};

use geo::{Euclidean, InterpolatableLine, Length, LineString, Point, Rect};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BratError, Result};

pub type ReachId = i64;

pub const REACH_ID: &str = "ReachID";
pub const STREAM_ID: &str = "StreamID";
pub const REACH_DIST: &str = "ReachDist";

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    /// Numeric view of the value; text is never numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Text(_) => None,
        }
    }

    /// Integer view; floats are accepted only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Coordinate reference system of a layer or raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub name: String,
    pub projected: bool,
}

impl SpatialReference {
    pub fn projected(name: impl Into<String>) -> Self {
        Self { name: name.into(), projected: true }
    }

    pub fn geographic(name: impl Into<String>) -> Self {
        Self { name: name.into(), projected: false }
    }

    /// Fails with a message naming `input` if this is not a projected system.
    pub fn require_projected(&self, input: &str) -> Result<()> {
        if self.projected {
            Ok(())
        } else {
            Err(BratError::NotProjected { input: input.to_string(), found: self.name.clone() })
        }
    }
}

/// One reach of the stream network.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Native row order in the layer this segment was read from or created in.
    pub fid: usize,
    pub geometry: LineString<f64>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Segment {
    pub fn new(fid: usize, geometry: LineString<f64>) -> Self {
        Self { fid, geometry, attributes: BTreeMap::new() }
    }

    pub fn reach_id(&self) -> Option<ReachId> {
        self.attributes.get(REACH_ID).and_then(AttrValue::as_i64)
    }

    pub fn stream_id(&self) -> Option<i64> {
        self.attributes.get(STREAM_ID).and_then(AttrValue::as_i64)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.attributes.get(field).and_then(AttrValue::as_f64)
    }

    /// Planar length in CRS units.
    pub fn length(&self) -> f64 {
        Euclidean.length(&self.geometry)
    }

    pub fn start_point(&self) -> Option<Point<f64>> {
        self.geometry.points().next()
    }

    pub fn end_point(&self) -> Option<Point<f64>> {
        self.geometry.points().last()
    }

    /// Point halfway along the line (by length), not the middle vertex.
    pub fn midpoint(&self) -> Option<Point<f64>> {
        self.geometry.point_at_ratio_from_start(&Euclidean, 0.5)
    }
}

/// Ordered collection of segments with a field schema.
#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    pub spatial_reference: SpatialReference,
    fields: Vec<String>,
    pub segments: Vec<Segment>,
}

/// Result of joining one keyed value onto a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Found,
    MissingKey,
}

/// Per-join summary: which segments kept their previous value.
#[derive(Debug, Default, Clone)]
pub struct JoinReport {
    pub joined: usize,
    pub missing: Vec<ReachId>,
}

impl JoinReport {
    /// Warn about segments `field` was not joined onto. Returns true if any.
    pub fn warn_missing(&self, field: &str) -> bool {
        if self.missing.is_empty() {
            return false;
        }
        warn!(field, ids = ?self.missing, "no value for these segments; left unmodified");
        true
    }
}

impl Network {
    /// Build a network from segments; the schema is the union of the
    /// segments' attribute names in first-seen order.
    pub fn new(name: impl Into<String>, spatial_reference: SpatialReference, segments: Vec<Segment>) -> Self {
        let mut fields: Vec<String> = Vec::new();
        for seg in &segments {
            for key in seg.attributes.keys() {
                if !fields.iter().any(|f| f == key) {
                    fields.push(key.clone());
                }
            }
        }
        Self { name: name.into(), spatial_reference, fields, segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn add_field(&mut self, field: &str) {
        if !self.has_field(field) {
            self.fields.push(field.to_string());
        }
    }

    /// Remove a field from the schema and every segment.
    pub fn delete_field(&mut self, field: &str) {
        self.fields.retain(|f| f != field);
        for seg in &mut self.segments {
            seg.attributes.remove(field);
        }
    }

    /// Drop any of `fields` that exist, so a stage can rewrite them cleanly.
    pub fn drop_fields(&mut self, fields: &[&str]) {
        for field in fields {
            if self.has_field(field) {
                debug!(field, "dropping stale field");
                self.delete_field(field);
            }
        }
    }

    /// Set `field` to `value` on every segment.
    pub fn fill_field(&mut self, field: &str, value: AttrValue) {
        self.add_field(field);
        for seg in &mut self.segments {
            seg.attributes.insert(field.to_string(), value.clone());
        }
    }

    /// Reach ids in row order; errors if any segment has none.
    pub fn reach_ids(&self) -> Result<Vec<ReachId>> {
        self.segments
            .iter()
            .map(|s| s.reach_id().ok_or(BratError::MissingReachId { fid: s.fid }))
            .collect()
    }

    pub fn find(&self, id: ReachId) -> Option<&Segment> {
        self.segments.iter().find(|s| s.reach_id() == Some(id))
    }

    /// Join an `id → value` mapping onto `field` by ReachID.
    ///
    /// A segment whose id is absent from `values` keeps whatever value it had
    /// and is listed in the report.
    pub fn join_values(&mut self, field: &str, values: &BTreeMap<ReachId, f64>) -> JoinReport {
        self.add_field(field);
        let mut report = JoinReport::default();
        for seg in &mut self.segments {
            match join_one(seg, field, values) {
                JoinOutcome::Found => report.joined += 1,
                // -1 marks a segment that has no id at all.
                JoinOutcome::MissingKey => report.missing.push(seg.reach_id().unwrap_or(-1)),
            }
        }
        report
    }

    /// Bounding rectangle of all segment geometries.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        let mut coords = self.segments.iter().flat_map(|s| s.geometry.coords());
        let first = coords.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for c in coords {
            min_x = min_x.min(c.x);
            min_y = min_y.min(c.y);
            max_x = max_x.max(c.x);
            max_y = max_y.max(c.y);
        }
        Some(Rect::new((min_x, min_y), (max_x, max_y)))
    }
}

fn join_one(seg: &mut Segment, field: &str, values: &BTreeMap<ReachId, f64>) -> JoinOutcome {
    match seg.reach_id().and_then(|id| values.get(&id)) {
        Some(&v) => {
            seg.attributes.insert(field.to_string(), AttrValue::Float(v));
            JoinOutcome::Found
        }
        None => JoinOutcome::MissingKey,
    }
}

/// Give every segment a stable `ReachID` from its native row order, unless
/// the network already has the field. Existing ids are never renumbered.
///
/// Returns `true` if ids were assigned.
pub fn ensure_reach_id(network: &mut Network) -> bool {
    if network.has_field(REACH_ID) {
        return false;
    }
    network.add_field(REACH_ID);
    for seg in &mut network.segments {
        seg.attributes.insert(REACH_ID.to_string(), AttrValue::Int(seg.fid as i64));
    }
    debug!(count = network.len(), "assigned ReachID from row order");
    true
}

/// Fails on the first ReachID seen twice (or on a segment with none).
pub fn verify_unique_reach_ids(network: &Network) -> Result<()> {
    let mut seen = HashSet::with_capacity(network.len());
    for id in network.reach_ids()? {
        if !seen.insert(id) {
            return Err(BratError::DuplicateReachId(id));
        }
    }
    Ok(())
}
