//! Run configuration.
//!
//! Every field has a default matching the Philadelphia parking violation
//! dataset layout, so an empty JSON object is a valid configuration.

use crate::catalog::CatalogOptions;
use crate::error::ConfigError;
use crate::index::IndexConfig;
use crate::ingest::{CoordinatePolicy, IngestOptions, PointColumns};
use crate::join::JoinOptions;
use crate::output::OutputOptions;
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration for one join run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub regions: RegionsConfig,

    #[serde(default)]
    pub points: PointsConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub join: JoinOptions,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Region source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionsConfig {
    #[serde(default = "RegionsConfig::default_path")]
    pub path: PathBuf,

    #[serde(default = "RegionsConfig::default_name_property")]
    pub name_property: String,
}

impl RegionsConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("data/Neighborhoods_Philadelphia.json")
    }

    fn default_name_property() -> String {
        CatalogOptions::DEFAULT_NAME_PROPERTY.to_string()
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions::default().with_name_property(self.name_property.clone())
    }
}

impl Default for RegionsConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            name_property: Self::default_name_property(),
        }
    }
}

/// Point source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointsConfig {
    #[serde(default = "PointsConfig::default_path")]
    pub path: PathBuf,

    #[serde(default = "PointsConfig::default_key_column")]
    pub key_column: usize,

    #[serde(default = "PointsConfig::default_x_column")]
    pub x_column: usize,

    #[serde(default = "PointsConfig::default_y_column")]
    pub y_column: usize,

    #[serde(default = "PointsConfig::default_delimiter")]
    pub delimiter: char,

    #[serde(default = "PointsConfig::default_has_header")]
    pub has_header: bool,

    /// Capacity hint for the record vector (tens of millions of rows).
    #[serde(default)]
    pub expected_rows: Option<usize>,

    #[serde(default)]
    pub coordinate_policy: CoordinatePolicy,
}

impl PointsConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("data/phl_parking.csv")
    }

    const fn default_key_column() -> usize {
        PointColumns::DEFAULT.key
    }

    const fn default_x_column() -> usize {
        PointColumns::DEFAULT.x
    }

    const fn default_y_column() -> usize {
        PointColumns::DEFAULT.y
    }

    const fn default_delimiter() -> char {
        ','
    }

    const fn default_has_header() -> bool {
        true
    }

    pub fn columns(&self) -> PointColumns {
        PointColumns::new(self.key_column, self.x_column, self.y_column)
    }

    /// Parser options; call after [`Config::validate`] so the delimiter is ASCII.
    pub fn ingest_options(&self) -> IngestOptions {
        let mut options = IngestOptions::default()
            .with_columns(self.columns())
            .with_delimiter(self.delimiter as u8)
            .with_header(self.has_header)
            .with_coordinate_policy(self.coordinate_policy);
        if let Some(rows) = self.expected_rows {
            options = options.with_expected_rows(rows);
        }
        options
    }
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            key_column: Self::default_key_column(),
            x_column: Self::default_x_column(),
            y_column: Self::default_y_column(),
            delimiter: Self::default_delimiter(),
            has_header: Self::default_has_header(),
            expected_rows: None,
            coordinate_policy: CoordinatePolicy::default(),
        }
    }
}

/// Output sink settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_path")]
    pub path: PathBuf,

    #[serde(default = "OutputConfig::default_header")]
    pub header: String,
}

impl OutputConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("data/output.csv")
    }

    fn default_header() -> String {
        OutputOptions::DEFAULT_HEADER.to_string()
    }

    pub fn output_options(&self) -> OutputOptions {
        OutputOptions::default().with_header(self.header.clone())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            header: Self::default_header(),
        }
    }
}

impl Config {
    pub fn with_regions_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.regions.path = path.into();
        self
    }

    pub fn with_points_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.points.path = path.into();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.path = path.into();
        self
    }

    pub fn with_columns(mut self, columns: PointColumns) -> Self {
        self.points.key_column = columns.key;
        self.points.x_column = columns.x;
        self.points.y_column = columns.y;
        self
    }

    pub fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn with_join(mut self, join: JoinOptions) -> Self {
        self.join = join;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.points.delimiter.is_ascii() || matches!(self.points.delimiter, '\r' | '\n') {
            return Err(ConfigError::Invalid(format!(
                "point delimiter must be a single ASCII character other than a line break, got {:?}",
                self.points.delimiter
            )));
        }
        if self.regions.name_property.is_empty() {
            return Err(ConfigError::Invalid(
                "region name property must not be empty".to_string(),
            ));
        }
        if self.index.max_fanout < 2 {
            return Err(ConfigError::Invalid(format!(
                "index max_fanout must be at least 2, got {}",
                self.index.max_fanout
            )));
        }
        self.join.validate()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Loads a config file, choosing the format from the extension
    /// (`.toml` requires the `toml` feature; anything else is read as JSON).
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            #[cfg(feature = "toml")]
            return Self::from_toml(&text).map_err(|e| ConfigError::Parse(e.to_string()));
            #[cfg(not(feature = "toml"))]
            return Err(ConfigError::Parse(
                "TOML config files require the `toml` feature".to_string(),
            ));
        }

        Self::from_json(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBackend;
    use crate::join::AmbiguityPolicy;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.points.columns(), PointColumns::new(0, 10, 9));
        assert_eq!(config.regions.name_property, "LISTNAME");
        assert_eq!(config.index.max_fanout, 64);
        assert_eq!(config.output.header, "external_key,region_name");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = Config::from_json("{}").unwrap();
        let default = Config::default();
        assert_eq!(config.points, default.points);
        assert_eq!(config.regions, default.regions);
        assert_eq!(config.output, default.output);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default()
            .with_regions_path("r.json")
            .with_columns(PointColumns::new(1, 2, 3))
            .with_index(IndexConfig::default().with_backend(IndexBackend::RStar))
            .with_join(
                JoinOptions::default()
                    .with_workers(3)
                    .with_ambiguity(AmbiguityPolicy::LowestId),
            );

        let json = config.to_json().unwrap();
        let deserialized = Config::from_json(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(Config::from_json(r#"{"points": {"colour": 1}}"#).is_err());
    }

    #[test]
    fn test_validation_failures() {
        assert!(Config::from_json(r#"{"join": {"workers": 0}}"#).is_err());
        assert!(Config::from_json(r#"{"index": {"max_fanout": 1}}"#).is_err());
        assert!(Config::from_json(r#"{"points": {"delimiter": "é"}}"#).is_err());
        assert!(Config::from_json(r#"{"regions": {"name_property": ""}}"#).is_err());
    }

    #[test]
    fn test_ingest_options_from_points_config() {
        let config = Config::from_json(
            r#"{"points": {"delimiter": ";", "has_header": false, "expected_rows": 10,
                           "coordinate_policy": "strict"}}"#,
        )
        .unwrap();
        let options = config.points.ingest_options();
        assert_eq!(options.delimiter, b';');
        assert!(!options.has_header);
        assert_eq!(options.expected_rows, Some(10));
        assert_eq!(options.coordinate_policy, CoordinatePolicy::Strict);
    }

    #[test]
    fn test_load_path_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("join.json");
        std::fs::write(&path, r#"{"output": {"path": "out.csv"}}"#).unwrap();

        let config = Config::load_path(&path).unwrap();
        assert_eq!(config.output.path, PathBuf::from("out.csv"));

        assert!(matches!(
            Config::load_path(dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default().with_points_path("points.csv");
        let text = config.to_toml().unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.points.path, PathBuf::from("points.csv"));
    }
}
