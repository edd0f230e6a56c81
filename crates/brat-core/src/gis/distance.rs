//! Euclidean distance surface from a set of source features.
use geo::{Distance, Euclidean, Geometry, Point};

use crate::raster::{Raster, RasterEnv};

/// Distance from every cell centre of `env` to the nearest of `sources`.
///
/// With no sources every cell is nodata. Rows are computed independently,
/// in parallel under the `threading` feature.
pub fn euclidean_distance(name: &str, sources: &[Geometry<f64>], env: &RasterEnv) -> Raster {
    let mut out = Raster::from_env(name, env, f32::NAN);
    if sources.is_empty() {
        return out;
    }
    let (width, min_x, min_y, cs) = (out.width, out.min_x, out.min_y, out.cell_size);
    let fill_row = |row: usize, cells: &mut [f32]| {
        let y = min_y + (row as f64 + 0.5) * cs;
        for (col, cell) in cells.iter_mut().enumerate() {
            let p = Point::new(min_x + (col as f64 + 0.5) * cs, y);
            let d = sources
                .iter()
                .map(|g| Euclidean.distance(&p, g))
                .fold(f64::INFINITY, f64::min);
            *cell = d as f32;
        }
    };

    #[cfg(feature = "threading")]
    {
        use rayon::prelude::*;
        out.data.par_chunks_mut(width).enumerate().for_each(|(row, cells)| fill_row(row, cells));
    }
    #[cfg(not(feature = "threading"))]
    {
        out.data.chunks_mut(width).enumerate().for_each(|(row, cells)| fill_row(row, cells));
    }
    out
}
