//! Bounded-retry zonal aggregation.
//!
//! The primitive may drop zones that overlap others. Dropped ids are retried
//! in rounds restricted to just those ids; a round that resolves nothing
//! counts as stalled, any progress resets the count. After
//! `max_stalled_rounds` consecutive stalls the remaining ids get the
//! sentinel value and a warning.
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::{IdFilter, StatKind, ZonalPrimitive, Zone};
use crate::config::BratConfig;
use crate::error::Result;
use crate::network::{Network, ReachId};
use crate::raster::Raster;

/// Total `id → value` mapping plus how it was obtained.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub values: BTreeMap<ReachId, f64>,
    /// Retry rounds run after the initial full pass.
    pub retry_rounds: u32,
    /// Ids that were filled with the sentinel.
    pub unresolved: Vec<ReachId>,
}

pub struct Aggregator<'a, P: ZonalPrimitive + ?Sized> {
    primitive: &'a P,
    pub max_stalled_rounds: u32,
    pub unresolved_value: f64,
}

impl<'a, P: ZonalPrimitive + ?Sized> Aggregator<'a, P> {
    pub fn new(primitive: &'a P) -> Self {
        Self::from_config(primitive, &BratConfig::default())
    }

    pub fn from_config(primitive: &'a P, config: &BratConfig) -> Self {
        Self {
            primitive,
            max_stalled_rounds: config.max_stalled_rounds.max(1),
            unresolved_value: config.unresolved_value,
        }
    }

    /// Compute `stat` of `raster` over every zone, total over the zone ids.
    ///
    /// `field` only names the result in log output.
    pub fn aggregate(&self, zones: &[Zone], raster: &Raster, stat: StatKind, field: &str) -> Result<Aggregation> {
        let ids: BTreeSet<ReachId> = zones.iter().map(|z| z.id).collect();
        let mut values: BTreeMap<ReachId, f64> = self
            .primitive
            .zonal_statistics(zones, &IdFilter::All, raster, stat)?
            .into_iter()
            .filter(|(id, _)| ids.contains(id))
            .collect();

        let mut need: BTreeSet<ReachId> = ids.iter().filter(|id| !values.contains_key(id)).copied().collect();
        let mut stalled = 0u32;
        let mut rounds = 0u32;
        let mut unresolved = Vec::new();

        while !need.is_empty() {
            rounds += 1;
            let filter = IdFilter::for_ids(&need);
            debug!(field, round = rounds, remaining = need.len(), "retrying zones missing from zonal statistics");
            let found = self.primitive.zonal_statistics(zones, &filter, raster, stat)?;

            let progressed: BTreeSet<ReachId> = found.keys().filter(|id| need.contains(id)).copied().collect();
            for id in &progressed {
                values.insert(*id, found[id]);
            }

            if progressed.is_empty() {
                stalled += 1;
            } else {
                stalled = 0;
            }
            if stalled >= self.max_stalled_rounds {
                warn!(
                    field,
                    ids = ?need,
                    value = self.unresolved_value,
                    "zonal statistics never resolved these zones; writing sentinel"
                );
                for id in &need {
                    values.insert(*id, self.unresolved_value);
                }
                unresolved = need.into_iter().collect();
                break;
            }
            need.retain(|id| !progressed.contains(id));
        }

        Ok(Aggregation { values, retry_rounds: rounds, unresolved })
    }

    /// Aggregate and join the result onto `network` as `field`.
    pub fn aggregate_into(
        &self,
        network: &mut Network,
        zones: &[Zone],
        raster: &Raster,
        stat: StatKind,
        field: &str,
    ) -> Result<Aggregation> {
        let agg = self.aggregate(zones, raster, stat, field)?;
        let report = network.join_values(field, &agg.values);
        report.warn_missing(field);
        debug!(field, joined = report.joined, retries = agg.retry_rounds, "aggregated");
        Ok(agg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SpatialReference;
    use geo::{MultiPolygon, Rect};
    use std::cell::{Cell, RefCell};

    fn zones(n: i64) -> Vec<Zone> {
        (0..n)
            .map(|i| {
                let r = Rect::new((i as f64, 0.0), (i as f64 + 1.0, 1.0));
                Zone::new(i, MultiPolygon::new(vec![r.to_polygon()]))
            })
            .collect()
    }

    fn raster() -> Raster {
        Raster::new("r", 4, 1, 0.0, 0.0, 1.0, SpatialReference::projected("UTM"), 1.0)
    }

    /// Resolves every selected id except those in `blocked`.
    struct Blocking {
        blocked: BTreeSet<ReachId>,
        calls: Cell<u32>,
    }

    impl ZonalPrimitive for Blocking {
        fn zonal_statistics(
            &self,
            zones: &[Zone],
            filter: &IdFilter,
            _raster: &Raster,
            _stat: StatKind,
        ) -> Result<BTreeMap<ReachId, f64>> {
            self.calls.set(self.calls.get() + 1);
            Ok(zones
                .iter()
                .filter(|z| filter.matches(z.id) && !self.blocked.contains(&z.id))
                .map(|z| (z.id, z.id as f64 * 10.0))
                .collect())
        }
    }

    /// Full pass drops every id in `hidden`; each retry resolves only the
    /// smallest remaining id.
    struct OnePerRound {
        hidden: BTreeSet<ReachId>,
        filters: RefCell<Vec<IdFilter>>,
    }

    impl ZonalPrimitive for OnePerRound {
        fn zonal_statistics(
            &self,
            zones: &[Zone],
            filter: &IdFilter,
            _raster: &Raster,
            _stat: StatKind,
        ) -> Result<BTreeMap<ReachId, f64>> {
            self.filters.borrow_mut().push(filter.clone());
            let selected: Vec<ReachId> = zones.iter().map(|z| z.id).filter(|id| filter.matches(*id)).collect();
            if *filter == IdFilter::All {
                return Ok(selected.into_iter().filter(|id| !self.hidden.contains(id)).map(|id| (id, 1.0)).collect());
            }
            Ok(selected.into_iter().min().map(|id| (id, 2.0)).into_iter().collect())
        }
    }

    #[test]
    fn no_overlap_needs_no_retry() {
        let p = Blocking { blocked: BTreeSet::new(), calls: Cell::new(0) };
        let agg = Aggregator::new(&p).aggregate(&zones(4), &raster(), StatKind::Mean, "x").unwrap();
        assert_eq!(agg.retry_rounds, 0);
        assert_eq!(p.calls.get(), 1, "primitive should run exactly once");
        assert_eq!(agg.values.len(), 4);
        assert!(agg.unresolved.is_empty());
    }

    #[test]
    fn progress_every_round_completes_the_mapping() {
        let p = OnePerRound { hidden: [1, 2, 3].into(), filters: RefCell::new(Vec::new()) };
        let agg = Aggregator::new(&p).aggregate(&zones(4), &raster(), StatKind::Max, "x").unwrap();
        assert_eq!(agg.retry_rounds, 3);
        assert_eq!(agg.values.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(agg.values[&0], 1.0);
        assert_eq!(agg.values[&3], 2.0);
        let filters = p.filters.borrow();
        assert_eq!(filters[1], IdFilter::In([1, 2, 3].into()));
        assert_eq!(filters[3], IdFilter::Eq(3), "single remaining id uses equality");
    }

    #[test]
    fn stalled_primitive_stops_after_five_rounds_with_sentinel() {
        let p = Blocking { blocked: [2].into(), calls: Cell::new(0) };
        let agg = Aggregator::new(&p).aggregate(&zones(4), &raster(), StatKind::Min, "x").unwrap();
        assert_eq!(agg.retry_rounds, 5);
        assert_eq!(p.calls.get(), 6);
        assert_eq!(agg.unresolved, vec![2]);
        assert_eq!(agg.values[&2], 0.0);
        assert_eq!(agg.values[&1], 10.0);
    }

    #[test]
    fn configured_bound_and_sentinel_are_honoured() {
        let p = Blocking { blocked: [0, 1].into(), calls: Cell::new(0) };
        let cfg = BratConfig { max_stalled_rounds: 2, unresolved_value: -9999.0, ..BratConfig::default() };
        let agg = Aggregator::from_config(&p, &cfg).aggregate(&zones(3), &raster(), StatKind::Min, "x").unwrap();
        assert_eq!(agg.retry_rounds, 2);
        assert_eq!(agg.values[&0], -9999.0);
        assert_eq!(agg.values[&1], -9999.0);
    }

    #[test]
    fn aggregate_into_joins_by_reach_id() {
        use crate::network::{ensure_reach_id, Segment};
        use geo::line_string;
        let segs = (0..3)
            .map(|i| Segment::new(i, line_string![(x: i as f64, y: 0.5), (x: i as f64 + 1.0, y: 0.5)]))
            .collect();
        let mut net = Network::new("n", SpatialReference::projected("UTM"), segs);
        ensure_reach_id(&mut net);
        net.segments.reverse();
        let p = Blocking { blocked: BTreeSet::new(), calls: Cell::new(0) };
        Aggregator::new(&p).aggregate_into(&mut net, &zones(3), &raster(), StatKind::Mean, "v").unwrap();
        for seg in &net.segments {
            assert_eq!(seg.get_f64("v"), Some(seg.reach_id().unwrap() as f64 * 10.0));
        }
    }

    #[test]
    fn overlapping_line_buffers_match_their_standalone_values() {
        use crate::gis::buffer_line;
        use crate::zonal::RasterizedZonal;
        use geo::line_string;

        let mut grid = Raster::new("x", 70, 20, 0.0, 0.0, 5.0, SpatialReference::projected("UTM"), 0.0);
        for row in 0..grid.height {
            for col in 0..grid.width {
                let x = grid.cell_center(row, col).x;
                grid.set(row, col, x as f32);
            }
        }
        let zones: Vec<Zone> = (0..3)
            .map(|i| {
                let x0 = 20.0 + 100.0 * i as f64;
                Zone::new(i, buffer_line(&line_string![(x: x0, y: 50.0), (x: x0 + 100.0, y: 50.0)], 30.0, 8))
            })
            .collect();

        let agg = Aggregator::new(&RasterizedZonal);
        for stat in [StatKind::Min, StatKind::Max, StatKind::Mean] {
            let all = agg.aggregate(&zones, &grid, stat, "x").unwrap();
            assert!(all.retry_rounds > 0, "adjacent buffers overlap and must be retried");
            assert!(all.unresolved.is_empty());
            for zone in &zones {
                let alone = agg.aggregate(std::slice::from_ref(zone), &grid, stat, "x").unwrap();
                assert_eq!(alone.retry_rounds, 0);
                assert_eq!(all.values[&zone.id], alone.values[&zone.id], "zone {} {stat:?}", zone.id);
            }
        }
    }
}
