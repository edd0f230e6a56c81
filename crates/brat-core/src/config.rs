use serde::{Deserialize, Serialize};

/// Run configuration for the attribute table pipeline.
/// Defaults reproduce the standard BRAT table distances and sentinels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BratConfig {
    /// Narrow network buffer (m): vegetation, conflict distances.
    pub buffer_small_m: f64,
    /// Wide network buffer (m): vegetation, land use.
    pub buffer_large_m: f64,
    /// Buffer around start/end vertices for elevation (m).
    pub vertex_buffer_m: f64,
    /// Buffer around segment midpoints for drainage area (m).
    pub midpoint_buffer_m: f64,
    /// Cell size of Euclidean distance surfaces (m).
    pub distance_cell_size_m: f64,
    /// Padding added around the network extent for derived rasters (m).
    pub extent_padding_m: f64,
    /// Distance written when no conflict feature is present.
    pub no_conflict_distance: f64,
    pub min_slope: f64,
    pub min_drainage_area_km2: f64,
    /// Consecutive zero-progress retry rounds before sentinel fill.
    pub max_stalled_rounds: u32,
    /// Value given to ids the zonal primitive never resolves.
    pub unresolved_value: f64,
    /// Search tolerance when locating midpoints on routes (m).
    pub route_tolerance_m: f64,
    /// Segments per quarter circle when buffering.
    pub buffer_quadrant_segments: usize,
    pub segment_network: bool,
    pub find_clusters: bool,
}

impl Default for BratConfig {
    fn default() -> Self {
        Self {
            buffer_small_m: 30.0,
            buffer_large_m: 100.0,
            vertex_buffer_m: 30.0,
            midpoint_buffer_m: 100.0,
            distance_cell_size_m: 5.0,
            extent_padding_m: 100.0,
            no_conflict_distance: 10_000.0,
            min_slope: 0.0001,
            min_drainage_area_km2: 1e-8,
            max_stalled_rounds: 5,
            unresolved_value: 0.0,
            route_tolerance_m: 1.0,
            buffer_quadrant_segments: 8,
            segment_network: false,
            find_clusters: false,
        }
    }
}
