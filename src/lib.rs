//! Parallel point-in-region spatial join.
//!
//! ## Features
//! - **Region catalog**: GeoJSON polygons and multipolygons with dense ids
//! - **Bulk-loaded index**: packed overlap-minimizing R-tree, or an `rstar` R*-tree
//! - **Parallel join**: bounded work queue feeding a fixed pool of worker threads
//! - **Streaming output**: matched `(key, region)` rows in input order
//!
//! ```rust
//! use regionjoin::prelude::*;
//!
//! let regions = r#"{"type":"FeatureCollection","features":[{"type":"Feature",
//!     "properties":{"LISTNAME":"A"},
//!     "geometry":{"type":"Polygon","coordinates":[[[0,0],[10,0],[10,10],[0,10],[0,0]]]}}]}"#;
//! let catalog = RegionCatalog::from_geojson_str(regions, &CatalogOptions::default())?;
//! let index = build_index(&catalog, &IndexConfig::default())?;
//!
//! let options = IngestOptions::default().with_columns(PointColumns::new(2, 0, 1));
//! let mut store = PointStore::parse("x,y,ticket\n5,5,T1\n50,50,T2\n".to_string(), &options)?;
//!
//! let engine = JoinEngine::new(&catalog, &index, JoinOptions::default())?;
//! let stats = engine.run(store.records_mut());
//! assert_eq!(stats.matched, 1);
//!
//! let mut out = Vec::new();
//! write_matches(&store, &catalog, &mut out, &OutputOptions::default())?;
//! assert_eq!(out, b"external_key,region_name\r\nT1,A\r\n");
//! # Ok::<(), regionjoin::RegionJoinError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod geometry;
pub mod index;
pub mod ingest;
pub mod join;
pub mod output;
pub mod pipeline;
pub mod types;

pub use catalog::{CatalogOptions, Region, RegionCatalog};
pub use config::Config;
pub use error::{
    ConfigError, IndexBuildError, LoadError, RegionJoinError, Result, WriteError,
};
pub use geometry::Boundary;
pub use index::{
    IndexBackend, IndexBuilder, IndexConfig, PackedRTree, RStarIndex, RegionIndex, SpatialIndex,
    build_index,
};
pub use ingest::{CoordinatePolicy, IngestOptions, IngestStats, PointColumns, PointStore};
pub use join::{AmbiguityPolicy, JoinEngine, JoinOptions, JoinStats};
pub use output::{OutputOptions, write_matches, write_path};
pub use pipeline::{Phase, PhaseEvent, RunSummary};
pub use types::{Envelope, PointRecord, RegionId};

pub use geo::{MultiPolygon, Point, Polygon, Rect};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Config, RegionJoinError, Result};

    pub use crate::{CatalogOptions, Region, RegionCatalog};

    pub use crate::{IndexConfig, SpatialIndex, build_index};

    pub use crate::{IngestOptions, PointColumns, PointStore};

    pub use crate::{AmbiguityPolicy, JoinEngine, JoinOptions};

    pub use crate::{OutputOptions, write_matches};

    pub use crate::{Envelope, Point, RegionId};
}
