//! R*-tree backend built with `rstar`'s bulk loader.
//!
//! `rstar` fixes its node capacity at compile time, so this backend ignores
//! the configured fanout.

use crate::index::SpatialIndex;
use crate::index::packed::IndexItem;
use crate::types::{Envelope, RegionId};
use rstar::{AABB, RTree, RTreeObject};
use std::ops::ControlFlow;

#[derive(Debug, Clone, PartialEq)]
struct IndexedRegion {
    id: RegionId,
    envelope: Envelope,
}

impl RTreeObject for IndexedRegion {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.envelope.min_x, self.envelope.min_y],
            [self.envelope.max_x, self.envelope.max_y],
        )
    }
}

pub struct RStarIndex {
    tree: RTree<IndexedRegion>,
}

impl RStarIndex {
    pub fn bulk_load(items: Vec<IndexItem>) -> Self {
        let regions = items
            .into_iter()
            .map(|item| IndexedRegion {
                id: item.id,
                envelope: item.envelope,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(regions),
        }
    }
}

impl SpatialIndex for RStarIndex {
    fn search(&self, query: &Envelope, visit: &mut dyn FnMut(RegionId) -> ControlFlow<()>) {
        let envelope = AABB::from_corners([query.min_x, query.min_y], [query.max_x, query.max_y]);
        for region in self.tree.locate_in_envelope_intersecting(&envelope) {
            if visit(region.id).is_break() {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}

impl std::fmt::Debug for RStarIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RStarIndex")
            .field("size", &self.tree.size())
            .finish()
    }
}
