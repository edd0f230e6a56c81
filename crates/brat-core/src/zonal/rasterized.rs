//! Zonal statistics by rasterizing zones onto the value grid.
//!
//! Zones are burned into a single zone-id grid in input order, each cell
//! taking the id of the last zone whose polygon contains the cell centre.
//! A zone that lost any cell to a later zone gets no output row: its
//! statistic would otherwise cover only part of its polygon. Only zones
//! that kept every cell are reported. Nodata cells are ignored; a zone with
//! only nodata gets no row.
use std::collections::{BTreeMap, BTreeSet};

use geo::{Contains, Point};

use super::{validate_zones, IdFilter, StatKind, ZonalPrimitive, Zone};
use crate::error::Result;
use crate::network::ReachId;
use crate::raster::Raster;

#[derive(Debug, Default, Clone, Copy)]
pub struct RasterizedZonal;

#[derive(Debug, Clone, Copy)]
struct Acc {
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

impl Acc {
    fn new() -> Self {
        Self { min: f64::INFINITY, max: f64::NEG_INFINITY, sum: 0.0, count: 0 }
    }

    fn push(&mut self, v: f64) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.sum += v;
        self.count += 1;
    }

    fn value(&self, stat: StatKind) -> f64 {
        match stat {
            StatKind::Min => self.min,
            StatKind::Max => self.max,
            StatKind::Mean => self.sum / self.count as f64,
        }
    }
}

/// Zone grid produced by [`RasterizedZonal::burn`].
#[derive(Debug, Clone, Default)]
pub struct Burn {
    /// Zone id owning each cell.
    pub owner: Vec<Option<ReachId>>,
    /// Zones that had at least one data cell taken over by a later zone.
    pub clipped: BTreeSet<ReachId>,
}

impl RasterizedZonal {
    /// Burn the zones selected by `filter` into one grid, last writer wins.
    pub fn burn(&self, zones: &[Zone], filter: &IdFilter, raster: &Raster) -> Burn {
        let mut burn = Burn { owner: vec![None; raster.data.len()], clipped: BTreeSet::new() };
        for zone in zones.iter().filter(|z| filter.matches(z.id)) {
            let Some(bounds) = zone.bounds() else { continue };
            let (rows, cols) = raster.window(&bounds);
            for r in rows {
                for c in cols.clone() {
                    if !zone.polygon.contains(&Point::from(raster.cell_center(r, c))) {
                        continue;
                    }
                    let idx = r * raster.width + c;
                    // Taking over a nodata cell leaves the previous zone's statistic intact.
                    let has_data = !raster.data[idx].is_nan();
                    if let Some(prev) = burn.owner[idx].replace(zone.id) {
                        if prev != zone.id && has_data {
                            burn.clipped.insert(prev);
                        }
                    }
                }
            }
        }
        burn
    }
}

impl ZonalPrimitive for RasterizedZonal {
    fn zonal_statistics(
        &self,
        zones: &[Zone],
        filter: &IdFilter,
        raster: &Raster,
        stat: StatKind,
    ) -> Result<BTreeMap<ReachId, f64>> {
        raster.validate()?;
        validate_zones(zones)?;
        let burn = self.burn(zones, filter, raster);
        let mut acc: BTreeMap<ReachId, Acc> = BTreeMap::new();
        for (cell, id) in burn.owner.iter().enumerate() {
            let (Some(id), v) = (id, raster.data[cell]) else { continue };
            if v.is_nan() || burn.clipped.contains(id) {
                continue;
            }
            acc.entry(*id).or_insert_with(Acc::new).push(v as f64);
        }
        Ok(acc.into_iter().map(|(id, a)| (id, a.value(stat))).collect())
    }
}
