//! Packed, immutable R-tree built with overlap-minimizing top-down bulk loading.
//!
//! The item set is partitioned recursively: at each level the items are
//! sorted by x into roughly √S vertical slices, each slice is sorted by y and
//! cut into groups of at most one subtree's capacity. Every leaf sits at the
//! same depth and no node has more than `max_fanout` children.
//!
//! Nodes live in a single flat vector. A node's children are stored
//! contiguously, so a node is just an envelope plus a `(first, len)` range
//! into either the node vector (branches) or the item vector (leaves).

use crate::error::IndexBuildError;
use crate::index::SpatialIndex;
use crate::types::{Envelope, RegionId};
use smallvec::SmallVec;
use std::ops::ControlFlow;

/// A bounding box with its region reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexItem {
    pub id: RegionId,
    pub envelope: Envelope,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    envelope: Envelope,
    first: u32,
    len: u32,
    leaf: bool,
}

/// Collects items before bulk loading.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    items: Vec<IndexItem>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, id: RegionId, min_x: f64, min_y: f64, max_x: f64, max_y: f64) {
        self.items.push(IndexItem {
            id,
            envelope: Envelope::new(min_x, min_y, max_x, max_y),
        });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn finish(self, max_fanout: usize) -> Result<PackedRTree, IndexBuildError> {
        PackedRTree::build(self.items, max_fanout)
    }
}

/// Immutable bulk-loaded R-tree over region bounding boxes.
#[derive(Debug, Clone)]
pub struct PackedRTree {
    items: Vec<IndexItem>,
    nodes: Vec<Node>,
    root: Option<Node>,
    height: usize,
    max_fanout: usize,
}

impl PackedRTree {
    pub const DEFAULT_MAX_FANOUT: usize = 64;

    /// Bulk loads `items`. Item order is not preserved.
    pub fn build(mut items: Vec<IndexItem>, max_fanout: usize) -> Result<Self, IndexBuildError> {
        if max_fanout < 2 {
            return Err(IndexBuildError::InvalidFanout(max_fanout));
        }
        if items.len() > u32::MAX as usize {
            return Err(IndexBuildError::TooManyItems(items.len()));
        }
        if let Some(bad) = items.iter().find(|item| !item.envelope.is_valid()) {
            let e = bad.envelope;
            return Err(IndexBuildError::InvalidBoundingBox {
                id: bad.id.0,
                min_x: e.min_x,
                min_y: e.min_y,
                max_x: e.max_x,
                max_y: e.max_y,
            });
        }

        let mut tree = Self {
            items: Vec::new(),
            nodes: Vec::new(),
            root: None,
            height: 0,
            max_fanout,
        };
        if items.is_empty() {
            return Ok(tree);
        }

        let height = tree_height(items.len(), max_fanout);
        let root = tree.pack(&mut items, 0, height);
        tree.items = items;
        tree.root = Some(root);
        tree.height = height;

        log::debug!(
            "Packed {} items into {} nodes (height {}, fanout {})",
            tree.items.len(),
            tree.nodes.len() + 1,
            height,
            max_fanout
        );
        Ok(tree)
    }

    /// Builds the subtree over `items`, which start at `offset` in the final
    /// item vector. Returns the subtree root; its descendants are appended to
    /// `self.nodes`.
    fn pack(&mut self, items: &mut [IndexItem], offset: usize, height: usize) -> Node {
        if height <= 1 {
            let envelope = items
                .iter()
                .fold(Envelope::empty(), |acc, item| acc.union(&item.envelope));
            return Node {
                envelope,
                first: offset as u32,
                len: items.len() as u32,
                leaf: true,
            };
        }

        let subtree_capacity = self.max_fanout.pow((height - 1) as u32);
        let children = items.len().div_ceil(subtree_capacity);
        let slices = (children as f64).sqrt().ceil() as usize;
        let slice_len = subtree_capacity * children.div_ceil(slices);

        items.sort_unstable_by(|a, b| a.envelope.center_x().total_cmp(&b.envelope.center_x()));

        let mut child_nodes: SmallVec<[Node; 64]> = SmallVec::with_capacity(children);
        let mut slice_offset = offset;
        for slice in items.chunks_mut(slice_len) {
            slice.sort_unstable_by(|a, b| a.envelope.center_y().total_cmp(&b.envelope.center_y()));

            let mut group_offset = slice_offset;
            for group in slice.chunks_mut(subtree_capacity) {
                let group_len = group.len();
                child_nodes.push(self.pack(group, group_offset, height - 1));
                group_offset += group_len;
            }
            slice_offset += slice.len();
        }

        let envelope = child_nodes
            .iter()
            .fold(Envelope::empty(), |acc, node| acc.union(&node.envelope));
        let first = self.nodes.len() as u32;
        let len = child_nodes.len() as u32;
        self.nodes.extend(child_nodes);

        Node {
            envelope,
            first,
            len,
            leaf: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of levels from root to leaves; 0 for an empty tree.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn max_fanout(&self) -> usize {
        self.max_fanout
    }

    /// Envelope of every item, or `None` for an empty tree.
    pub fn bounds(&self) -> Option<Envelope> {
        self.root.map(|root| root.envelope)
    }

    /// Visits every item whose envelope intersects `query` until `visit`
    /// breaks. Returns whether the search was stopped early.
    pub fn search<F>(&self, query: &Envelope, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(RegionId) -> ControlFlow<()>,
    {
        let Some(root) = self.root else {
            return ControlFlow::Continue(());
        };
        if !root.envelope.intersects(query) {
            return ControlFlow::Continue(());
        }

        let mut stack: SmallVec<[Node; 32]> = SmallVec::new();
        stack.push(root);

        while let Some(node) = stack.pop() {
            let range = node.first as usize..(node.first + node.len) as usize;
            if node.leaf {
                for item in &self.items[range] {
                    if item.envelope.intersects(query) {
                        visit(item.id)?;
                    }
                }
            } else {
                for child in &self.nodes[range] {
                    if child.envelope.intersects(query) {
                        stack.push(*child);
                    }
                }
            }
        }

        ControlFlow::Continue(())
    }
}

impl SpatialIndex for PackedRTree {
    fn search(&self, query: &Envelope, visit: &mut dyn FnMut(RegionId) -> ControlFlow<()>) {
        let _ = PackedRTree::search(self, query, visit);
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Smallest height such that `max_fanout^height >= len`.
fn tree_height(len: usize, max_fanout: usize) -> usize {
    let mut height = 1;
    let mut capacity = max_fanout;
    while capacity < len {
        capacity = capacity.saturating_mul(max_fanout);
        height += 1;
    }
    height
}
