//! Network segmentation at crossing features.
use geo::{Coord, Distance, Euclidean, Length, Line, LineString, Point};
use tracing::{debug, info};

use crate::error::Result;
use crate::gis::overlay::line_crossings;
use crate::gis::LineLayer;
use crate::network::{ensure_reach_id, Network, Segment, REACH_DIST, REACH_ID};
use crate::routes::compute_reach_distance;

/// Pieces shorter than this are treated as zero-length and discarded.
const MIN_PIECE_LENGTH: f64 = 1e-9;

/// Position of `c` along `line` as (sub-segment index, parameter in [0, 1]),
/// for every sub-segment `c` lies on.
fn positions_on(line: &LineString<f64>, c: Coord<f64>) -> Vec<(usize, f64)> {
    let p = Point::from(c);
    line.lines()
        .enumerate()
        .filter(|(_, seg)| Euclidean.distance(&p, seg) <= 1e-7)
        .map(|(i, seg)| (i, parameter(seg, c)))
        .collect()
}

fn parameter(seg: Line<f64>, c: Coord<f64>) -> f64 {
    let d = seg.delta();
    let len2 = d.x * d.x + d.y * d.y;
    if len2 == 0.0 {
        return 0.0;
    }
    (((c.x - seg.start.x) * d.x + (c.y - seg.start.y) * d.y) / len2).clamp(0.0, 1.0)
}

/// Split `line` at every coordinate of `cuts` lying on it. Zero-length
/// pieces are dropped; the pieces cover `line` exactly otherwise.
pub fn split_line(line: &LineString<f64>, cuts: &[Coord<f64>]) -> Vec<LineString<f64>> {
    let mut at: Vec<(usize, f64, Coord<f64>)> = cuts
        .iter()
        .flat_map(|&c| positions_on(line, c).into_iter().map(move |(i, t)| (i, t, c)))
        .collect();
    at.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut pieces = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();
    let push = |v: &mut Vec<Coord<f64>>, c: Coord<f64>| {
        if v.last() != Some(&c) {
            v.push(c);
        }
    };
    let mut cut_iter = at.into_iter().peekable();
    for (i, seg) in line.lines().enumerate() {
        push(&mut current, seg.start);
        while let Some((_, _, c)) = cut_iter.next_if(|(j, _, _)| *j == i) {
            push(&mut current, c);
            pieces.push(LineString::new(std::mem::take(&mut current)));
            current.push(c);
        }
        push(&mut current, seg.end);
    }
    pieces.push(LineString::new(current));
    pieces.retain(|p| p.0.len() >= 2 && Euclidean.length(p) > MIN_PIECE_LENGTH);
    pieces
}

/// Split every segment of `network` where it meets `features`.
///
/// Pieces keep their parent's attributes except `ReachID`, and get fresh ids
/// from their new row order. `ReachDist` is recomputed on the result from
/// routes built over `network`.
pub fn segment_by_features(network: &Network, features: &LineLayer, route_tolerance: f64) -> Result<Network> {
    info!(features = %features.name, "segmenting network");
    let mut segments = Vec::new();
    for seg in &network.segments {
        let cuts = line_crossings(&seg.geometry, &features.lines);
        let pieces = if cuts.is_empty() { vec![seg.geometry.clone()] } else { split_line(&seg.geometry, &cuts) };
        if pieces.len() > 1 {
            debug!(fid = seg.fid, pieces = pieces.len(), "split segment");
        }
        for geometry in pieces {
            let mut attributes = seg.attributes.clone();
            attributes.remove(REACH_ID);
            attributes.remove(REACH_DIST);
            segments.push(Segment { fid: segments.len(), geometry, attributes });
        }
    }

    let mut out = Network::new(network.name.clone(), network.spatial_reference.clone(), segments);
    ensure_reach_id(&mut out);
    let distances = compute_reach_distance(network, &out, route_tolerance)?;
    out.join_values(REACH_DIST, &distances).warn_missing(REACH_DIST);
    info!(before = network.len(), after = out.len(), "segmentation complete");
    Ok(out)
}
