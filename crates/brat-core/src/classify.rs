//! Restoration/conservation management zones.
//!
//! A reach is placed by existing capacity, historic capacity, conflict
//! potential and the share of moderate plus high intensity land use around
//! it. Capacity bands are ≤1, ≤5, ≤15 and >15 dams/km.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attributes::conflict::{HIGH_LU, MODERATE_LU};
use crate::network::{AttrValue, Network, Segment};

pub const EXISTING_CAPACITY: &str = "oCC_EX";
pub const HISTORIC_CAPACITY: &str = "oCC_PT";
pub const CONFLICT_SCORE: &str = "oPC_Score";
pub const MANAGEMENT_ZONE: &str = "oPBRC";

const LOW_CONFLICT: f64 = 0.25;
const HIGH_CONFLICT: f64 = 0.75;
const HIGH_LAND_USE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagementZone {
    NaturallyLimited,
    AnthropogenicallyLimited,
    QuickReturn,
    LongTermPossibility,
    LowHangingFruit,
    LivingWithBeaverLowSource,
    LivingWithBeaverHighSource,
    /// Inputs fell outside every band (e.g. missing capacity).
    NotPredicted,
}

impl ManagementZone {
    pub const ALL: [ManagementZone; 8] = [
        ManagementZone::NaturallyLimited,
        ManagementZone::AnthropogenicallyLimited,
        ManagementZone::QuickReturn,
        ManagementZone::LongTermPossibility,
        ManagementZone::LowHangingFruit,
        ManagementZone::LivingWithBeaverLowSource,
        ManagementZone::LivingWithBeaverHighSource,
        ManagementZone::NotPredicted,
    ];

    /// Text written to the output table.
    pub fn label(self) -> &'static str {
        match self {
            ManagementZone::NaturallyLimited => "Unsuitable: Naturally Limited",
            ManagementZone::AnthropogenicallyLimited => "Unsuitable: Anthropogenically Limited",
            ManagementZone::QuickReturn => "Quick Return Restoration Zone",
            ManagementZone::LongTermPossibility => "Long Term Possibility Restoration Zone",
            ManagementZone::LowHangingFruit => "Low Hanging Fruit - Potential Restoration/Conservation Zone",
            ManagementZone::LivingWithBeaverLowSource => "Living with Beaver (Low Source)",
            ManagementZone::LivingWithBeaverHighSource => "Living with Beaver (High Source)",
            ManagementZone::NotPredicted => "NOT PREDICTED - Requires Manual Attention",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|z| z.label() == label)
    }
}

impl fmt::Display for ManagementZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationInput {
    pub existing_capacity: f64,
    pub historic_capacity: f64,
    pub conflict: f64,
    pub moderate_land_use: f64,
    pub high_land_use: f64,
}

impl ClassificationInput {
    /// Read a segment's fields. Missing capacities and conflict read as NaN,
    /// missing land-use shares as 0.
    pub fn from_segment(seg: &Segment) -> Self {
        let or_nan = |f: &str| seg.get_f64(f).unwrap_or(f64::NAN);
        Self {
            existing_capacity: or_nan(EXISTING_CAPACITY),
            historic_capacity: or_nan(HISTORIC_CAPACITY),
            conflict: or_nan(CONFLICT_SCORE),
            moderate_land_use: seg.get_f64(MODERATE_LU).unwrap_or(0.0),
            high_land_use: seg.get_f64(HIGH_LU).unwrap_or(0.0),
        }
    }

    pub fn land_use(&self) -> f64 {
        self.moderate_land_use + self.high_land_use
    }
}

/// Place one reach in its management zone. Total over all inputs,
/// including NaN.
pub fn classify(input: &ClassificationInput) -> ManagementZone {
    use ManagementZone::*;
    let capacity = input.existing_capacity;
    let potential = input.historic_capacity;
    let conflict = input.conflict;
    let land_use = input.land_use();

    if capacity <= 1.0 {
        if potential <= 1.0 {
            NaturallyLimited
        } else if conflict > HIGH_CONFLICT {
            AnthropogenicallyLimited
        } else if potential <= 5.0 {
            QuickReturn
        } else if conflict > LOW_CONFLICT || land_use > HIGH_LAND_USE {
            LongTermPossibility
        } else {
            QuickReturn
        }
    } else if capacity <= 5.0 {
        if conflict > HIGH_CONFLICT {
            AnthropogenicallyLimited
        } else if potential > 5.0 {
            LowHangingFruit
        } else if conflict <= LOW_CONFLICT {
            QuickReturn
        } else if land_use > HIGH_LAND_USE {
            LongTermPossibility
        } else {
            LivingWithBeaverLowSource
        }
    } else if capacity <= 15.0 {
        if conflict > HIGH_CONFLICT {
            AnthropogenicallyLimited
        } else if potential > 15.0 {
            if conflict <= LOW_CONFLICT {
                LowHangingFruit
            } else {
                LivingWithBeaverHighSource
            }
        } else if conflict <= LOW_CONFLICT {
            LowHangingFruit
        } else if land_use > HIGH_LAND_USE {
            LongTermPossibility
        } else {
            QuickReturn
        }
    } else if capacity > 15.0 {
        if conflict <= LOW_CONFLICT {
            LowHangingFruit
        } else if conflict > HIGH_CONFLICT {
            AnthropogenicallyLimited
        } else if land_use > HIGH_LAND_USE {
            LivingWithBeaverHighSource
        } else {
            QuickReturn
        }
    } else {
        NotPredicted
    }
}

/// Replace `oPBRC` on every segment with its management zone label.
pub fn apply_management_zones(network: &mut Network) {
    info!(segments = network.len(), "classifying management zones");
    network.drop_fields(&[MANAGEMENT_ZONE]);
    network.add_field(MANAGEMENT_ZONE);
    for seg in &mut network.segments {
        let zone = classify(&ClassificationInput::from_segment(seg));
        if zone == ManagementZone::NotPredicted {
            debug!(fid = seg.fid, "reach could not be classified");
        }
        seg.attributes.insert(MANAGEMENT_ZONE.into(), AttrValue::Text(zone.label().into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SpatialReference;
    use geo::line_string;
    use ManagementZone::*;

    fn input(capacity: f64, potential: f64, conflict: f64, land_use: f64) -> ClassificationInput {
        ClassificationInput {
            existing_capacity: capacity,
            historic_capacity: potential,
            conflict,
            moderate_land_use: land_use,
            high_land_use: 0.0,
        }
    }

    #[test]
    fn documented_examples() {
        assert_eq!(classify(&input(0.5, 0.5, 0.0, 0.0)), NaturallyLimited);
        assert_eq!(classify(&input(0.5, 10.0, 0.8, 0.0)), AnthropogenicallyLimited);
    }

    #[test]
    fn band_boundaries_are_inclusive() {
        // capacity exactly 1.0 stays in the lowest band.
        assert_eq!(classify(&input(1.0, 1.0, 0.0, 0.0)), NaturallyLimited);
        // conflict exactly 0.75 is not high conflict.
        assert_eq!(classify(&input(3.0, 3.0, 0.75, 0.0)), LivingWithBeaverLowSource);
        // conflict exactly 0.25 is low conflict.
        assert_eq!(classify(&input(3.0, 3.0, 0.25, 0.0)), QuickReturn);
        // capacity exactly 5.0 is occasional, 15.0 frequent.
        assert_eq!(classify(&input(5.0, 6.0, 0.5, 0.0)), LowHangingFruit);
        assert_eq!(classify(&input(15.0, 16.0, 0.5, 0.0)), LivingWithBeaverHighSource);
        // potential exactly 5.0 in the lowest band is a quick return.
        assert_eq!(classify(&input(0.5, 5.0, 0.5, 0.9)), QuickReturn);
    }

    #[test]
    fn land_use_breaks_ties_in_each_band() {
        assert_eq!(classify(&input(0.5, 10.0, 0.1, 0.6)), LongTermPossibility);
        assert_eq!(classify(&input(0.5, 10.0, 0.1, 0.5)), QuickReturn);
        assert_eq!(classify(&input(3.0, 3.0, 0.5, 0.6)), LongTermPossibility);
        assert_eq!(classify(&input(10.0, 10.0, 0.5, 0.6)), LongTermPossibility);
        assert_eq!(classify(&input(10.0, 10.0, 0.5, 0.4)), QuickReturn);
        assert_eq!(classify(&input(20.0, 20.0, 0.5, 0.6)), LivingWithBeaverHighSource);
        assert_eq!(classify(&input(20.0, 20.0, 0.5, 0.4)), QuickReturn);
        assert_eq!(classify(&input(20.0, 20.0, 0.9, 0.0)), AnthropogenicallyLimited);
        assert_eq!(classify(&input(20.0, 0.0, 0.1, 0.0)), LowHangingFruit);
    }

    #[test]
    fn nan_capacity_is_not_predicted() {
        assert_eq!(classify(&input(f64::NAN, 10.0, 0.1, 0.0)), NotPredicted);
    }

    #[test]
    fn labels_round_trip_and_are_distinct() {
        for zone in ManagementZone::ALL {
            assert_eq!(ManagementZone::from_label(zone.label()), Some(zone));
        }
        assert_eq!(ManagementZone::from_label("Beaver Paradise"), None);
    }

    #[test]
    fn network_gets_fresh_labels() {
        let mut seg = Segment::new(0, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]);
        seg.attributes.insert(EXISTING_CAPACITY.into(), AttrValue::Float(20.0));
        seg.attributes.insert(HISTORIC_CAPACITY.into(), AttrValue::Float(25.0));
        seg.attributes.insert(CONFLICT_SCORE.into(), AttrValue::Float(0.1));
        seg.attributes.insert(MANAGEMENT_ZONE.into(), AttrValue::Text("old".into()));
        let bare = Segment::new(1, line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]);
        let mut n = Network::new("n", SpatialReference::projected("UTM"), vec![seg, bare]);
        apply_management_zones(&mut n);
        assert_eq!(n.segments[0].attributes[MANAGEMENT_ZONE], AttrValue::Text(LowHangingFruit.label().into()));
        assert_eq!(n.segments[1].attributes[MANAGEMENT_ZONE], AttrValue::Text(NotPredicted.label().into()));
    }
}
