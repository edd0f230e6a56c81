//! Braided-channel handling.
//!
//! Detecting braids and clustering them is delegated; this module owns the
//! contract and the `IsMainCh` initialisation every delegate builds on.
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::gis::LineLayer;
use crate::network::{AttrValue, Network};

pub const IS_MAIN_CHANNEL: &str = "IsMainCh";
pub const CLUSTER_ID: &str = "ClusterID";

/// External braid detector.
///
/// `mark_braids` runs after every segment has `IsMainCh = 1` and may set it
/// to 0 on side channels. `assign_clusters` writes `ClusterID`.
pub trait BraidDelegate {
    fn mark_braids(&self, network: &mut Network, canals: Option<&LineLayer>, scratch: &Path) -> Result<()>;

    fn assign_clusters(&self, network: &mut Network) -> Result<()>;
}

/// Delegate for single-threaded networks: every segment stays on the main
/// channel and none belongs to a cluster.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleThreaded;

/// `ClusterID` of a segment outside every cluster.
pub const NO_CLUSTER: i64 = -1;

impl BraidDelegate for SingleThreaded {
    fn mark_braids(&self, _network: &mut Network, _canals: Option<&LineLayer>, _scratch: &Path) -> Result<()> {
        Ok(())
    }

    fn assign_clusters(&self, network: &mut Network) -> Result<()> {
        network.fill_field(CLUSTER_ID, AttrValue::Int(NO_CLUSTER));
        Ok(())
    }
}

/// Initialise `IsMainCh`, run the delegate, and optionally cluster.
pub fn handle_braids(
    network: &mut Network,
    canals: Option<&LineLayer>,
    scratch: &Path,
    find_clusters: bool,
    delegate: &dyn BraidDelegate,
) -> Result<()> {
    info!("finding multi-threaded attributes");
    network.fill_field(IS_MAIN_CHANNEL, AttrValue::Int(1));
    delegate.mark_braids(network, canals, scratch)?;
    if find_clusters {
        info!("finding clusters");
        delegate.assign_clusters(network)?;
    }
    Ok(())
}
