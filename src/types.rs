//! Core value types shared by the catalog, index, and join engine.

use geo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense region identifier. Equal to the region's position in the catalog
/// and to the leaf reference stored in the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl RegionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned bounding box in the regions' coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Degenerate envelope used for point queries.
    pub const fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// An envelope that contains nothing and is the identity for [`Envelope::union`].
    pub const fn empty() -> Self {
        Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    /// Finite coordinates with min <= max on both axes.
    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    /// Closed-interval overlap test; touching edges intersect.
    #[inline]
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.intersects(&Envelope::point(x, y))
    }

    #[inline]
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    #[inline]
    pub fn center_x(&self) -> f64 {
        (self.min_x + self.max_x) / 2.0
    }

    #[inline]
    pub fn center_y(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }
}

impl From<Rect> for Envelope {
    fn from(rect: Rect) -> Self {
        Envelope::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// One input point awaiting assignment to a region.
///
/// The external key is stored as a byte span into the owning
/// [`PointStore`](crate::ingest::PointStore) text buffer so that ingesting
/// millions of rows does not allocate per row.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    /// Zero-based data row in input order.
    pub row: usize,
    pub point: Point,
    pub(crate) key_start: usize,
    pub(crate) key_end: usize,
    region: Option<RegionId>,
}

impl PointRecord {
    /// An unassigned record with an empty key.
    pub fn at(row: usize, point: Point) -> Self {
        Self::new(row, point, 0, 0)
    }

    /// A record whose key is `text[key_start..key_end]` of the owning store.
    pub(crate) fn new(row: usize, point: Point, key_start: usize, key_end: usize) -> Self {
        Self {
            row,
            point,
            key_start,
            key_end,
            region: None,
        }
    }

    pub fn region(&self) -> Option<RegionId> {
        self.region
    }

    pub fn is_assigned(&self) -> bool {
        self.region.is_some()
    }

    /// Record the containing region. A slot is written at most once; callers
    /// check [`PointRecord::is_assigned`] first.
    pub fn assign(&mut self, region: RegionId) {
        debug_assert!(
            self.region.is_none(),
            "row {} already assigned to region {:?}",
            self.row,
            self.region
        );
        if self.region.is_none() {
            self.region = Some(region);
        }
    }
}
