//! Zonal statistics over buffer zones.
//!
//! `ZonalPrimitive` is the engine-level operation, allowed to return an
//! incomplete table when zones overlap. `Aggregator` wraps it with bounded
//! retries so callers always get a value for every zone id.
pub mod aggregator;
pub mod rasterized;

use std::collections::{BTreeMap, BTreeSet};

use geo::{BoundingRect, CoordsIter, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{BratError, Result};
use crate::network::ReachId;
use crate::raster::Raster;

pub use aggregator::{Aggregation, Aggregator};
pub use rasterized::RasterizedZonal;

/// Buffer polygon tagged with the ReachID it was generated from.
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: ReachId,
    pub polygon: MultiPolygon<f64>,
}

impl Zone {
    pub fn new(id: ReachId, polygon: MultiPolygon<f64>) -> Self {
        Self { id, polygon }
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.polygon.bounding_rect()
    }
}

/// Summary statistic computed over the cells of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatKind {
    Min,
    Max,
    Mean,
}

/// Selection of zones by id, independent of any query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdFilter {
    All,
    Eq(ReachId),
    In(BTreeSet<ReachId>),
}

impl IdFilter {
    /// Equality for a single id, set membership otherwise.
    pub fn for_ids(ids: &BTreeSet<ReachId>) -> Self {
        match ids.first() {
            Some(&id) if ids.len() == 1 => IdFilter::Eq(id),
            _ => IdFilter::In(ids.clone()),
        }
    }

    pub fn matches(&self, id: ReachId) -> bool {
        match self {
            IdFilter::All => true,
            IdFilter::Eq(x) => *x == id,
            IdFilter::In(set) => set.contains(&id),
        }
    }
}

/// Engine-level zonal statistics.
///
/// Returns `id → value` for the zones selected by `filter`. Implementations
/// may silently omit zones (for example when zones overlap); they fail only
/// on structurally invalid input.
pub trait ZonalPrimitive {
    fn zonal_statistics(
        &self,
        zones: &[Zone],
        filter: &IdFilter,
        raster: &Raster,
        stat: StatKind,
    ) -> Result<BTreeMap<ReachId, f64>>;
}

/// Rejects zones with non-finite coordinates.
pub fn validate_zones(zones: &[Zone]) -> Result<()> {
    for zone in zones {
        if zone.polygon.coords_iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
            return Err(BratError::InvalidZones(format!("zone {} has non-finite coordinates", zone.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_uses_equality_for_single_id() {
        let one: BTreeSet<ReachId> = [7].into();
        assert_eq!(IdFilter::for_ids(&one), IdFilter::Eq(7));
        let many: BTreeSet<ReachId> = [3, 7].into();
        let f = IdFilter::for_ids(&many);
        assert!(f.matches(3) && f.matches(7) && !f.matches(4));
    }
}
