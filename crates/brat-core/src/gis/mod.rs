//! Reference GIS primitives: buffering, vector overlay, distance surfaces and
//! raster-to-polygon conversion, built on `geo`.
//!
//! The attribute pipeline only depends on the contracts these functions
//! expose; the zonal-statistics primitive sits behind the
//! [`crate::zonal::ZonalPrimitive`] trait instead.
pub mod buffer;
pub mod distance;
pub mod overlay;

use geo::{LineString, MultiLineString, MultiPolygon};

use crate::network::SpatialReference;

pub use buffer::{buffer_line, buffer_point};
pub use distance::euclidean_distance;
pub use overlay::{clip_lines, crossing_points, raster_to_polygons, tabulate_intersection, ClassPolygon, ZoneClassArea};

/// A single-part line layer (roads, railroads, canals).
#[derive(Debug, Clone)]
pub struct LineLayer {
    pub name: String,
    pub spatial_reference: SpatialReference,
    pub lines: Vec<LineString<f64>>,
}

impl LineLayer {
    pub fn new(name: impl Into<String>, spatial_reference: SpatialReference, lines: Vec<LineString<f64>>) -> Self {
        Self { name: name.into(), spatial_reference, lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_multi(&self) -> MultiLineString<f64> {
        MultiLineString::new(self.lines.clone())
    }
}

/// A polygon layer (valley bottom).
#[derive(Debug, Clone)]
pub struct PolygonLayer {
    pub name: String,
    pub spatial_reference: SpatialReference,
    pub polygons: MultiPolygon<f64>,
}

/// Split every multi-part line into its parts, dropping parts with fewer
/// than two coordinates.
pub fn multipart_to_singlepart(parts: MultiLineString<f64>) -> Vec<LineString<f64>> {
    parts.0.into_iter().filter(|l| l.0.len() >= 2).collect()
}
