//! Immutable spatial indexes over region bounding boxes.
//!
//! Indexes are built once from the catalog and shared read-only by every join
//! worker. A search visits candidate region ids whose stored box overlaps the
//! query box; exact containment is the join engine's job.

pub mod packed;
pub mod rstar_index;

pub use packed::{IndexBuilder, IndexItem, PackedRTree};
pub use rstar_index::RStarIndex;

use crate::catalog::RegionCatalog;
use crate::error::IndexBuildError;
use crate::geometry::Boundary;
use crate::types::{Envelope, RegionId};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// Box-overlap query interface shared by all index backends.
pub trait SpatialIndex: Send + Sync {
    /// Visits every stored id whose box intersects `query`, in
    /// implementation-defined order, until `visit` breaks.
    fn search(&self, query: &Envelope, visit: &mut dyn FnMut(RegionId) -> ControlFlow<()>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collects every candidate for `query`.
    fn candidates(&self, query: &Envelope) -> Vec<RegionId> {
        let mut hits = Vec::new();
        self.search(query, &mut |id| {
            hits.push(id);
            ControlFlow::Continue(())
        });
        hits
    }
}

/// Which index implementation to bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// Overlap-minimizing packed tree with configurable fanout.
    #[default]
    Packed,
    /// `rstar` R*-tree bulk load; fanout is fixed by the crate.
    #[serde(rename = "rstar")]
    RStar,
}

/// Index construction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    #[serde(default = "IndexConfig::default_max_fanout")]
    pub max_fanout: usize,

    #[serde(default)]
    pub backend: IndexBackend,
}

impl IndexConfig {
    const fn default_max_fanout() -> usize {
        PackedRTree::DEFAULT_MAX_FANOUT
    }

    pub fn with_max_fanout(mut self, max_fanout: usize) -> Self {
        self.max_fanout = max_fanout;
        self
    }

    pub fn with_backend(mut self, backend: IndexBackend) -> Self {
        self.backend = backend;
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_fanout: Self::default_max_fanout(),
            backend: IndexBackend::default(),
        }
    }
}

/// A built index of either backend.
#[derive(Debug)]
pub enum RegionIndex {
    Packed(PackedRTree),
    RStar(RStarIndex),
}

impl SpatialIndex for RegionIndex {
    #[inline]
    fn search(&self, query: &Envelope, visit: &mut dyn FnMut(RegionId) -> ControlFlow<()>) {
        match self {
            RegionIndex::Packed(tree) => SpatialIndex::search(tree, query, visit),
            RegionIndex::RStar(tree) => tree.search(query, visit),
        }
    }

    fn len(&self) -> usize {
        match self {
            RegionIndex::Packed(tree) => tree.len(),
            RegionIndex::RStar(tree) => SpatialIndex::len(tree),
        }
    }
}

/// Bulk loads the bounding boxes of every region in `catalog`.
pub fn build_index<B: Boundary>(
    catalog: &RegionCatalog<B>,
    config: &IndexConfig,
) -> Result<RegionIndex, IndexBuildError> {
    let items: Vec<IndexItem> = catalog
        .index_items()
        .into_iter()
        .map(|(id, envelope)| IndexItem { id, envelope })
        .collect();

    let index = match config.backend {
        IndexBackend::Packed => RegionIndex::Packed(PackedRTree::build(items, config.max_fanout)?),
        IndexBackend::RStar => {
            if config.max_fanout < 2 {
                return Err(IndexBuildError::InvalidFanout(config.max_fanout));
            }
            RegionIndex::RStar(RStarIndex::bulk_load(items))
        }
    };
    log::info!(
        "Built {:?} index over {} regions",
        config.backend,
        SpatialIndex::len(&index)
    );
    Ok(index)
}
