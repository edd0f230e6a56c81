//! Depression filling by priority flood.
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use super::flow_routing::D8_OFFSETS;
use crate::error::Result;
use crate::raster::Raster;

/// A depression-free surface plus, for every cell reached by the flood,
/// the cell it was reached from.
pub struct FilledDem {
    pub surface: Raster,
    /// Flat areas drain toward this cell; `None` for outlets and nodata.
    pub flood_parent: Vec<Option<usize>>,
}

fn in_bounds(r: isize, c: isize, rows: usize, cols: usize) -> bool {
    r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols
}

/// Fill every depression of `dem` so each data cell can drain to the grid
/// edge or to a nodata cell.
///
/// Outlets (data cells on the edge or next to nodata) seed a min-heap;
/// cells are raised to the lowest spill elevation seen on their way in.
pub fn fill_depressions(dem: &Raster) -> Result<FilledDem> {
    dem.validate()?;
    let (rows, cols) = (dem.height, dem.width);
    let n = rows * cols;
    let mut filled = dem.data.clone();
    let mut processed = vec![false; n];
    let mut flood_parent: Vec<Option<usize>> = vec![None; n];
    let mut queue: BinaryHeap<Reverse<(OrderedFloat<f32>, usize)>> = BinaryHeap::new();

    for r in 0..rows {
        for c in 0..cols {
            let i = r * cols + c;
            if dem.data[i].is_nan() {
                processed[i] = true;
                continue;
            }
            let outlet = D8_OFFSETS.iter().any(|&(dr, dc)| {
                let (nr, nc) = (r as isize + dr, c as isize + dc);
                !in_bounds(nr, nc, rows, cols) || dem.get(nr as usize, nc as usize).is_nan()
            });
            if outlet {
                processed[i] = true;
                queue.push(Reverse((OrderedFloat(filled[i]), i)));
            }
        }
    }

    while let Some(Reverse((level, i))) = queue.pop() {
        let (r, c) = (i / cols, i % cols);
        for &(dr, dc) in &D8_OFFSETS {
            let (nr, nc) = (r as isize + dr, c as isize + dc);
            if !in_bounds(nr, nc, rows, cols) {
                continue;
            }
            let j = nr as usize * cols + nc as usize;
            if processed[j] {
                continue;
            }
            processed[j] = true;
            filled[j] = filled[j].max(level.0);
            flood_parent[j] = Some(i);
            queue.push(Reverse((OrderedFloat(filled[j]), j)));
        }
    }

    let surface = dem.with_data(format!("{}_filled", dem.name), filled)?;
    Ok(FilledDem { surface, flood_parent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SpatialReference;

    fn bowl() -> Raster {
        let mut r = Raster::new("dem", 5, 5, 0.0, 0.0, 10.0, SpatialReference::projected("UTM"), 10.0);
        r.set(2, 2, 1.0);
        r.set(1, 2, 5.0);
        r.set(0, 2, 4.0);
        r
    }

    #[test]
    fn pit_is_raised_to_its_spill_level() {
        let f = fill_depressions(&bowl()).unwrap();
        assert_eq!(f.surface.get(2, 2), 5.0, "pit should fill to the 5.0 saddle");
        assert_eq!(f.surface.get(0, 2), 4.0, "outlet keeps its elevation");
        assert_eq!(f.surface.get(4, 4), 10.0);
    }

    #[test]
    fn no_cell_is_lowered_and_nodata_survives() {
        let mut dem = bowl();
        dem.set(4, 0, f32::NAN);
        let f = fill_depressions(&dem).unwrap();
        for (a, b) in dem.data.iter().zip(&f.surface.data) {
            if a.is_nan() {
                assert!(b.is_nan());
            } else {
                assert!(b >= a, "filled {b} below original {a}");
            }
        }
    }
}
