//! Linear referencing: stream routes and distance along them.
//!
//! The original (unsegmented) network is dissolved by `StreamID` into
//! single-part routes, each measured from 0 at its first vertex to its
//! length. Segment midpoints are then located on those routes.
use std::collections::{BTreeMap, HashMap};

use geo::{Coord, Distance, Euclidean, Length, LineLocatePoint, LineString, Point};
use tracing::debug;

use crate::error::{BratError, Result};
use crate::network::{Network, ReachId};

/// A measured route: one connected, unbranched run of a stream.
#[derive(Debug, Clone)]
pub struct Route {
    pub stream_id: Option<i64>,
    pub geometry: LineString<f64>,
    /// Measure at the last vertex; the first is 0.
    pub length: f64,
}

impl Route {
    fn new(stream_id: Option<i64>, geometry: LineString<f64>) -> Self {
        let length = Euclidean.length(&geometry);
        Self { stream_id, geometry, length }
    }

    /// Measure of the point on this route closest to `p`.
    pub fn measure(&self, p: &Point<f64>) -> Option<f64> {
        self.geometry.line_locate_point(p).map(|fraction| fraction * self.length)
    }
}

type NodeKey = (u64, u64);

fn node(c: Coord<f64>) -> NodeKey {
    (c.x.to_bits(), c.y.to_bits())
}

/// Merge lines that meet end-to-start at nodes touched by exactly those two
/// lines. Lines are never merged across a confluence or split.
fn chain_unsplit(lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    let mut starts: HashMap<NodeKey, Vec<usize>> = HashMap::new();
    let mut ends: HashMap<NodeKey, Vec<usize>> = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        let (Some(&first), Some(&last)) = (line.0.first(), line.0.last()) else { continue };
        starts.entry(node(first)).or_default().push(i);
        ends.entry(node(last)).or_default().push(i);
    }
    let through = |key: &NodeKey| -> Option<(usize, usize)> {
        match (ends.get(key).map(Vec::as_slice), starts.get(key).map(Vec::as_slice)) {
            (Some(&[inbound]), Some(&[outbound])) if inbound != outbound => Some((inbound, outbound)),
            _ => None,
        }
    };
    let next_of = |i: usize| lines[i].0.last().and_then(|&c| through(&node(c))).map(|(_, out)| out);
    let has_prev = |i: usize| lines[i].0.first().and_then(|&c| through(&node(c))).is_some();

    let mut visited = vec![false; lines.len()];
    let mut out = Vec::new();
    // Chain heads first, then whatever is left (closed loops).
    let order: Vec<usize> = (0..lines.len()).filter(|&i| !has_prev(i)).chain(0..lines.len()).collect();
    for head in order {
        if visited[head] {
            continue;
        }
        let mut coords: Vec<Coord<f64>> = Vec::new();
        let mut cur = Some(head);
        while let Some(i) = cur {
            if visited[i] {
                break;
            }
            visited[i] = true;
            let skip = usize::from(!coords.is_empty());
            coords.extend(lines[i].0.iter().skip(skip).copied());
            cur = next_of(i);
        }
        if coords.len() >= 2 {
            out.push(LineString::new(coords));
        }
    }
    out
}

/// Dissolve `network` by `StreamID` into single-part, unsplit routes.
/// Segments without a `StreamID` form one group of their own.
pub fn create_routes(network: &Network) -> Vec<Route> {
    let mut groups: BTreeMap<Option<i64>, Vec<LineString<f64>>> = BTreeMap::new();
    for seg in &network.segments {
        groups.entry(seg.stream_id()).or_default().push(seg.geometry.clone());
    }
    let routes: Vec<Route> = groups
        .into_iter()
        .flat_map(|(stream_id, lines)| chain_unsplit(lines).into_iter().map(move |g| Route::new(stream_id, g)))
        .collect();
    debug!(count = routes.len(), "created routes");
    routes
}

/// Measure of `p` on the nearest route within `tolerance`, considering only
/// routes of `stream_id` when one is given.
pub fn locate_point(routes: &[Route], p: &Point<f64>, stream_id: Option<i64>, tolerance: f64) -> Option<f64> {
    routes
        .iter()
        .filter(|r| stream_id.is_none() || r.stream_id == stream_id)
        .map(|r| (Euclidean.distance(p, &r.geometry), r))
        .filter(|(d, _)| *d <= tolerance)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .and_then(|(_, r)| r.measure(p))
}

/// Distance along its stream's route of every segment midpoint in
/// `segmented`, keyed by ReachID. Every id gets exactly one value.
pub fn compute_reach_distance(
    original: &Network,
    segmented: &Network,
    tolerance: f64,
) -> Result<BTreeMap<ReachId, f64>> {
    let routes = create_routes(original);
    let mut out = BTreeMap::new();
    for seg in &segmented.segments {
        let reach_id = seg.reach_id().ok_or(BratError::MissingReachId { fid: seg.fid })?;
        let stream_id = seg.stream_id();
        let measure = seg
            .midpoint()
            .and_then(|mid| locate_point(&routes, &mid, stream_id, tolerance))
            .ok_or(BratError::RouteLocation { reach_id, stream_id })?;
        out.insert(reach_id, measure);
    }
    Ok(out)
}
