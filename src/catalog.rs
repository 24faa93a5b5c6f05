//! Region catalog: named boundaries with dense sequential ids.
//!
//! Regions are loaded once from a GeoJSON feature collection and are
//! immutable afterwards. A region's id is its position in the catalog and
//! doubles as the leaf reference in the spatial index.

use crate::error::LoadError;
use crate::geometry::{Boundary, multipolygon_from_geojson};
use crate::types::{Envelope, RegionId};
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for reading region features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogOptions {
    /// Feature property holding the region label.
    pub name_property: String,
}

impl CatalogOptions {
    pub const DEFAULT_NAME_PROPERTY: &'static str = "LISTNAME";

    pub fn with_name_property(mut self, property: impl Into<String>) -> Self {
        self.name_property = property.into();
        self
    }
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            name_property: Self::DEFAULT_NAME_PROPERTY.to_string(),
        }
    }
}

/// A named region boundary.
#[derive(Debug, Clone)]
pub struct Region<B = MultiPolygon> {
    pub id: RegionId,
    pub name: String,
    pub boundary: B,
    pub bbox: Envelope,
}

/// Ordered, immutable set of regions.
#[derive(Debug, Clone)]
pub struct RegionCatalog<B = MultiPolygon> {
    regions: Vec<Region<B>>,
}

impl RegionCatalog<MultiPolygon> {
    /// Reads and parses a GeoJSON region file.
    pub fn load_path(path: impl AsRef<Path>, options: &CatalogOptions) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::InvalidData => LoadError::InvalidUtf8(path.to_path_buf()),
            _ => LoadError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::from_geojson_str(&text, options)
    }

    /// Parses a `FeatureCollection` (or a single `Feature`) into a catalog.
    ///
    /// Any malformed feature fails the whole load; no partial catalog is
    /// returned.
    pub fn from_geojson_str(text: &str, options: &CatalogOptions) -> Result<Self, LoadError> {
        let geojson: GeoJson = text
            .parse()
            .map_err(|e: geojson::Error| LoadError::InvalidGeoJson(e.to_string()))?;

        let features = match geojson {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err(LoadError::InvalidGeoJson(
                    "expected a FeatureCollection or Feature, got a bare Geometry".to_string(),
                ));
            }
        };

        let mut regions = Vec::with_capacity(features.len());
        for (position, feature) in features.iter().enumerate() {
            let name = feature_name(feature, position, &options.name_property)?;
            let geometry =
                feature
                    .geometry
                    .as_ref()
                    .ok_or_else(|| LoadError::InvalidFeature {
                        feature: position,
                        reason: "missing geometry".to_string(),
                    })?;
            let boundary = multipolygon_from_geojson(&geometry.value).map_err(|reason| {
                LoadError::InvalidFeature {
                    feature: position,
                    reason,
                }
            })?;
            regions.push((name, boundary));
        }

        let catalog = Self::from_boundaries(regions)?;
        log::info!(
            "Loaded {} regions (name property '{}')",
            catalog.len(),
            options.name_property
        );
        Ok(catalog)
    }
}

impl<B: Boundary> RegionCatalog<B> {
    /// Builds a catalog from named boundaries, assigning ids in iteration order.
    ///
    /// Fails with [`LoadError::InvalidFeature`] at the offending position when
    /// a boundary is empty or has a non-finite extent, or when the catalog
    /// would overflow 32-bit ids.
    pub fn from_boundaries<N, I>(boundaries: I) -> Result<Self, LoadError>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, B)>,
    {
        let iter = boundaries.into_iter();
        let mut regions = Vec::with_capacity(iter.size_hint().0);

        for (position, (name, boundary)) in iter.enumerate() {
            let id = u32::try_from(position)
                .map(RegionId)
                .map_err(|_| invalid(position, "too many regions for 32-bit ids"))?;
            let bbox = boundary
                .bounding_box()
                .ok_or_else(|| invalid(position, "boundary is empty"))?;
            if !bbox.is_valid() {
                return Err(invalid(position, format!("invalid bounding box {:?}", bbox)));
            }
            regions.push(Region {
                id,
                name: name.into(),
                boundary,
                bbox,
            });
        }

        Ok(Self { regions })
    }

    #[inline]
    pub fn get(&self, id: RegionId) -> Option<&Region<B>> {
        self.regions.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region<B>> {
        self.regions.iter()
    }

    /// `(id, bbox)` pairs in id order, ready for bulk loading.
    pub fn index_items(&self) -> Vec<(RegionId, Envelope)> {
        self.regions.iter().map(|r| (r.id, r.bbox)).collect()
    }
}

fn invalid(feature: usize, reason: impl Into<String>) -> LoadError {
    LoadError::InvalidFeature {
        feature,
        reason: reason.into(),
    }
}

fn feature_name(feature: &Feature, position: usize, property: &str) -> Result<String, LoadError> {
    let value = feature
        .properties
        .as_ref()
        .and_then(|props| props.get(property))
        .ok_or_else(|| LoadError::MissingProperty {
            feature: position,
            property: property.to_string(),
        })?;

    Ok(match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Point, Rect, coord, polygon};

    const TWO_HOODS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"LISTNAME": "Fishtown", "MAPNAME": "fish"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0,0.0],[10.0,0.0],[10.0,10.0],[0.0,10.0],[0.0,0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"LISTNAME": "Kensington"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[20.0,0.0],[30.0,0.0],[30.0,10.0],[20.0,10.0],[20.0,0.0]]],
                        [[[40.0,0.0],[50.0,0.0],[50.0,5.0],[40.0,5.0],[40.0,0.0]]]
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn test_load_assigns_sequential_ids() {
        let catalog = RegionCatalog::from_geojson_str(TWO_HOODS, &CatalogOptions::default()).unwrap();

        assert_eq!(catalog.len(), 2);
        let first = catalog.get(RegionId(0)).unwrap();
        let second = catalog.get(RegionId(1)).unwrap();
        assert_eq!(first.name, "Fishtown");
        assert_eq!(second.name, "Kensington");
        assert_eq!(first.bbox, Envelope::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(second.bbox, Envelope::new(20.0, 0.0, 50.0, 10.0));
        assert!(catalog.get(RegionId(2)).is_none());
    }

    #[test]
    fn test_bbox_is_per_feature() {
        let catalog = RegionCatalog::from_geojson_str(TWO_HOODS, &CatalogOptions::default()).unwrap();
        let items = catalog.index_items();
        assert_ne!(items[0].1, items[1].1);
        assert_eq!(items[0].0, RegionId(0));
    }

    #[test]
    fn test_custom_name_property() {
        let options = CatalogOptions::default().with_name_property("MAPNAME");
        let err = RegionCatalog::from_geojson_str(TWO_HOODS, &options).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingProperty { feature: 1, ref property } if property == "MAPNAME"
        ));
    }

    #[test]
    fn test_non_string_name_uses_json_text() {
        let json = r#"{"type":"Feature","properties":{"LISTNAME":42},
            "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}"#;
        let catalog = RegionCatalog::from_geojson_str(json, &CatalogOptions::default()).unwrap();
        assert_eq!(catalog.get(RegionId(0)).unwrap().name, "42");
    }

    #[test]
    fn test_missing_geometry_fails() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"LISTNAME":"A"},"geometry":null}]}"#;
        let err = RegionCatalog::from_geojson_str(json, &CatalogOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidFeature { feature: 0, .. }));
    }

    #[test]
    fn test_wrong_geometry_type_fails() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"LISTNAME":"A"},
             "geometry":{"type":"Point","coordinates":[1.0,2.0]}}]}"#;
        let err = RegionCatalog::from_geojson_str(json, &CatalogOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Point"));
    }

    #[test]
    fn test_bare_geometry_and_garbage_fail() {
        let geometry = r#"{"type":"Point","coordinates":[1.0,2.0]}"#;
        assert!(matches!(
            RegionCatalog::from_geojson_str(geometry, &CatalogOptions::default()),
            Err(LoadError::InvalidGeoJson(_))
        ));
        assert!(matches!(
            RegionCatalog::from_geojson_str("not json", &CatalogOptions::default()),
            Err(LoadError::InvalidGeoJson(_))
        ));
    }

    #[test]
    fn test_load_path_missing_file() {
        let err = RegionCatalog::load_path("/nonexistent/regions.json", &CatalogOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_from_boundaries_with_rects() {
        let catalog = RegionCatalog::from_boundaries(vec![
            ("west", Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 })),
            ("east", Rect::new(coord! { x: 2.0, y: 0.0 }, coord! { x: 3.0, y: 1.0 })),
        ])
        .unwrap();

        let east = catalog.get(RegionId(1)).unwrap();
        assert_eq!(east.name, "east");
        assert!(east.boundary.contains_point(&Point::new(2.5, 0.5)));
        assert_eq!(catalog.iter().count(), 2);
    }

    #[test]
    fn test_from_boundaries_reports_bad_position() {
        let err = RegionCatalog::from_boundaries(vec![
            ("ok", MultiPolygon::new(vec![geo::polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ]])),
            ("empty", MultiPolygon::new(vec![])),
        ])
        .unwrap_err();

        match err {
            LoadError::InvalidFeature { feature, reason } => {
                assert_eq!(feature, 1);
                assert_eq!(reason, "boundary is empty");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
