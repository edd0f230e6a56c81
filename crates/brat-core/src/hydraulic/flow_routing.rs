//! D8 flow direction and accumulation.
use super::fill::FilledDem;

/// Neighbour offsets as (d_row, d_col): E, NE, N, NW, W, SW, S, SE.
/// Row 0 is the southern edge, so +1 row is north.
pub const D8_OFFSETS: [(isize, isize); 8] = [(0, 1), (1, 1), (1, 0), (1, -1), (0, -1), (-1, -1), (-1, 0), (-1, 1)];

/// Distance to each neighbour in cell units.
pub const D8_DIST: [f64; 8] = [
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
];

/// Direction value for cells that drain nowhere (outlets, nodata).
pub const SINK: u8 = 8;

pub struct FlowField {
    /// D8 flow direction (0-7, 8=sink/nodata).
    pub direction: Vec<u8>,
    /// Number of cells draining through each cell, excluding the cell itself.
    pub accumulation: Vec<u32>,
    pub width: usize,
    pub height: usize,
}

impl FlowField {
    /// Index of the cell `i` drains into, if any.
    pub fn downstream(&self, i: usize) -> Option<usize> {
        let k = *self.direction.get(i)?;
        let &(dr, dc) = D8_OFFSETS.get(k as usize)?;
        let (r, c) = ((i / self.width) as isize + dr, (i % self.width) as isize + dc);
        if r < 0 || c < 0 || r as usize >= self.height || c as usize >= self.width {
            return None;
        }
        Some(r as usize * self.width + c as usize)
    }
}

fn direction_to(from: usize, to: usize, width: usize) -> Option<u8> {
    let dr = (to / width) as isize - (from / width) as isize;
    let dc = (to % width) as isize - (from % width) as isize;
    D8_OFFSETS.iter().position(|&o| o == (dr, dc)).map(|k| k as u8)
}

/// Steepest-descent D8 routing on a filled surface.
///
/// Cells with no strictly lower neighbour follow their flood parent, so
/// filled flats drain consistently toward their outlet.
pub fn compute_d8_flow(filled: &FilledDem) -> FlowField {
    let surface = &filled.surface;
    let (rows, cols) = (surface.height, surface.width);
    let n = rows * cols;
    let mut direction = vec![SINK; n];

    for r in 0..rows {
        for c in 0..cols {
            let i = r * cols + c;
            let z0 = surface.data[i];
            if z0.is_nan() {
                continue;
            }
            let mut best_drop = 0.0f64;
            let mut best: Option<u8> = None;
            for (k, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
                let (nr, nc) = (r as isize + dr, c as isize + dc);
                if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                    continue;
                }
                let z1 = surface.get(nr as usize, nc as usize);
                if z1.is_nan() {
                    continue;
                }
                let drop = (z0 - z1) as f64 / D8_DIST[k];
                if drop > best_drop {
                    best_drop = drop;
                    best = Some(k as u8);
                }
            }
            let best = best.or_else(|| filled.flood_parent[i].and_then(|p| direction_to(i, p, cols)));
            if let Some(k) = best {
                direction[i] = k;
            }
        }
    }

    let mut flow = FlowField { direction, accumulation: vec![0; n], width: cols, height: rows };
    flow.accumulation = accumulate(&flow);
    flow
}

/// Upstream cell counts by topological order over the flow graph.
fn accumulate(flow: &FlowField) -> Vec<u32> {
    let n = flow.direction.len();
    let downstream: Vec<Option<usize>> = (0..n).map(|i| flow.downstream(i)).collect();
    let mut remaining = vec![0usize; n];
    for d in downstream.iter().flatten() {
        remaining[*d] += 1;
    }
    let mut acc = vec![0u32; n];
    let mut ready: Vec<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
    while let Some(i) = ready.pop() {
        if let Some(d) = downstream[i] {
            acc[d] += acc[i] + 1;
            remaining[d] -= 1;
            if remaining[d] == 0 {
                ready.push(d);
            }
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydraulic::fill::fill_depressions;
    use crate::network::SpatialReference;
    use crate::raster::Raster;

    /// Tilted plane draining east (+col).
    fn ramp(rows: usize, cols: usize) -> Raster {
        let mut r = Raster::new("dem", cols, rows, 0.0, 0.0, 10.0, SpatialReference::projected("UTM"), 0.0);
        for row in 0..rows {
            for col in 0..cols {
                r.set(row, col, (cols - col) as f32 * 5.0);
            }
        }
        r
    }

    #[test]
    fn ramp_drains_east_and_accumulates_along_rows() {
        let filled = fill_depressions(&ramp(3, 6)).unwrap();
        let flow = compute_d8_flow(&filled);
        assert_eq!(flow.direction[1 * 6 + 2], 0, "interior cell should flow east");
        assert_eq!(flow.accumulation[1 * 6], 0, "ridge cell has no upstream");
        let last = flow.accumulation[1 * 6 + 5];
        assert!(last >= 5, "outlet column must collect its row, got {last}");
    }

    #[test]
    fn accumulation_counts_every_upstream_cell_once() {
        let filled = fill_depressions(&ramp(4, 5)).unwrap();
        let flow = compute_d8_flow(&filled);
        let outlets_total: u32 = (0..flow.direction.len())
            .filter(|&i| flow.downstream(i).is_none())
            .map(|i| flow.accumulation[i] + 1)
            .sum();
        assert_eq!(outlets_total, 20, "every cell must reach exactly one outlet");
    }

    #[test]
    fn filled_pit_drains_out() {
        let mut dem = Raster::new("dem", 5, 5, 0.0, 0.0, 10.0, SpatialReference::projected("UTM"), 10.0);
        dem.set(2, 2, 1.0);
        dem.set(1, 2, 5.0);
        dem.set(0, 2, 4.0);
        let flow = compute_d8_flow(&fill_depressions(&dem).unwrap());
        let mut i = 2 * 5 + 2;
        let mut steps = 0;
        while let Some(d) = flow.downstream(i) {
            i = d;
            steps += 1;
            assert!(steps < 25, "flow path loops");
        }
        assert!(flow.accumulation[1 * 5 + 2] >= 1);
    }
}
