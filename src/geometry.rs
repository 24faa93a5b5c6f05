//! Geometry capability used by the join engine, and GeoJSON conversion.
//!
//! The join only needs two things from a region boundary: its bounding box
//! for the index pre-filter, and an exact point containment test. Both are
//! expressed by [`Boundary`] so the geometry backend can be swapped without
//! touching the join logic.

use crate::types::Envelope;
use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Point, Polygon, Rect};

/// Minimal geometry interface required by the catalog and join engine.
pub trait Boundary: Send + Sync {
    /// Bounding box of the boundary, or `None` for an empty geometry.
    fn bounding_box(&self) -> Option<Envelope>;

    /// Exact containment test. Points on the boundary line count as inside.
    fn contains_point(&self, point: &Point) -> bool;
}

impl Boundary for MultiPolygon {
    fn bounding_box(&self) -> Option<Envelope> {
        self.bounding_rect().map(Envelope::from)
    }

    fn contains_point(&self, point: &Point) -> bool {
        self.intersects(point)
    }
}

impl Boundary for Polygon {
    fn bounding_box(&self) -> Option<Envelope> {
        self.bounding_rect().map(Envelope::from)
    }

    fn contains_point(&self, point: &Point) -> bool {
        self.intersects(point)
    }
}

impl Boundary for Rect {
    fn bounding_box(&self) -> Option<Envelope> {
        Some(Envelope::from(*self))
    }

    fn contains_point(&self, point: &Point) -> bool {
        self.intersects(point)
    }
}

/// Converts a GeoJSON polygon or multipolygon value into a [`MultiPolygon`].
///
/// Returns a human-readable reason on failure; the catalog attaches the
/// feature position.
pub fn multipolygon_from_geojson(value: &geojson::Value) -> Result<MultiPolygon, String> {
    match value {
        geojson::Value::Polygon(rings) => Ok(MultiPolygon::new(vec![polygon_from_rings(rings)?])),
        geojson::Value::MultiPolygon(polygons) => {
            let polygons = polygons
                .iter()
                .map(|rings| polygon_from_rings(rings))
                .collect::<Result<Vec<_>, _>>()?;
            if polygons.is_empty() {
                return Err("MultiPolygon has no polygons".to_string());
            }
            Ok(MultiPolygon::new(polygons))
        }
        other => Err(format!(
            "expected Polygon or MultiPolygon geometry, got {}",
            geometry_type(other)
        )),
    }
}

fn geometry_type(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Result<Polygon, String> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Err("Polygon must have at least one ring".to_string());
    };

    let exterior = ring_from_positions(exterior)?;
    if exterior.0.len() < 3 {
        return Err(format!(
            "exterior ring needs at least 3 positions, got {}",
            exterior.0.len()
        ));
    }

    let interiors = interiors
        .iter()
        .map(|ring| ring_from_positions(ring))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn ring_from_positions(positions: &[Vec<f64>]) -> Result<LineString, String> {
    positions
        .iter()
        .map(|position| {
            if position.len() < 2 {
                return Err("Coordinate must have at least 2 values".to_string());
            }
            let (x, y) = (position[0], position[1]);
            if !x.is_finite() || !y.is_finite() {
                return Err(format!("Coordinate must be finite, got [{}, {}]", x, y));
            }
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::from)
}
