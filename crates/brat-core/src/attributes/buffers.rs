//! Zone builders: network, vertex and midpoint buffers keyed by ReachID.
use geo::{MultiPolygon, Point};

use crate::error::{BratError, Result};
use crate::gis::{buffer_line, buffer_point};
use crate::network::{Network, Segment};
use crate::zonal::Zone;

/// Which vertex of a segment a point buffer is built around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vertex {
    Start,
    End,
    Mid,
}

impl Vertex {
    fn of(self, seg: &Segment) -> Option<Point<f64>> {
        match self {
            Vertex::Start => seg.start_point(),
            Vertex::End => seg.end_point(),
            Vertex::Mid => seg.midpoint(),
        }
    }
}

/// Round-capped buffer of every segment at `distance`.
pub fn network_buffers(network: &Network, distance: f64, quadrant_segments: usize) -> Result<Vec<Zone>> {
    network
        .segments
        .iter()
        .map(|seg| {
            let id = seg.reach_id().ok_or(BratError::MissingReachId { fid: seg.fid })?;
            Ok(Zone::new(id, buffer_line(&seg.geometry, distance, quadrant_segments)))
        })
        .collect()
}

/// Circle of `distance` around one vertex of every segment.
pub fn vertex_buffers(network: &Network, vertex: Vertex, distance: f64, quadrant_segments: usize) -> Result<Vec<Zone>> {
    network
        .segments
        .iter()
        .map(|seg| {
            let id = seg.reach_id().ok_or(BratError::MissingReachId { fid: seg.fid })?;
            let p = vertex.of(seg).ok_or_else(|| BratError::InvalidGeometry {
                fid: seg.fid,
                reason: "no vertices".into(),
            })?;
            Ok(Zone::new(id, MultiPolygon::new(vec![buffer_point(p, distance, quadrant_segments)])))
        })
        .collect()
}

/// The two network buffers shared by the vegetation and conflict stages.
#[derive(Debug, Clone)]
pub struct NetworkBuffers {
    pub small: Vec<Zone>,
    pub large: Vec<Zone>,
}

impl NetworkBuffers {
    pub fn build(network: &Network, small_m: f64, large_m: f64, quadrant_segments: usize) -> Result<Self> {
        Ok(Self {
            small: network_buffers(network, small_m, quadrant_segments)?,
            large: network_buffers(network, large_m, quadrant_segments)?,
        })
    }
}
