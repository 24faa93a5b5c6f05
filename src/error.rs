//! Error types for region loading, index construction, and output.
//!
//! Every variant here is fatal to a run. Recoverable conditions (a point that
//! falls outside every region, a coordinate replaced under the zero-fill
//! policy) are reported through statistics instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to read or parse the region source or the point source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("feature {feature}: {reason}")]
    InvalidFeature { feature: usize, reason: String },

    #[error("feature {feature} is missing property '{property}'")]
    MissingProperty { feature: usize, property: String },

    #[error("line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("line {line}, column {column}: invalid coordinate '{value}'")]
    InvalidCoordinate {
        line: usize,
        column: usize,
        value: String,
    },

    #[error("{} is not valid UTF-8", .0.display())]
    InvalidUtf8(PathBuf),
}

/// Invalid input to the spatial index builder.
#[derive(Debug, Error, PartialEq)]
pub enum IndexBuildError {
    #[error("max fanout must be at least 2, got {0}")]
    InvalidFanout(usize),

    #[error("item {id} has an invalid bounding box [{min_x}, {min_y}, {max_x}, {max_y}]")]
    InvalidBoundingBox {
        id: u32,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },

    #[error("too many items for a 32-bit index: {0}")]
    TooManyItems(usize),
}

/// Failure while streaming matches to the output sink.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to create {}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write failed")]
    Io(#[from] io::Error),
}

/// Configuration that cannot be used to run a join.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("failed to read config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Top-level error for a join run.
#[derive(Debug, Error)]
pub enum RegionJoinError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    IndexBuild(#[from] IndexBuildError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, RegionJoinError>;
