//! `GeoJSON` loading for grid cells and occurrence points.
//!
//! Shapefile inputs are converted to `GeoJSON` upstream (`ogr2ogr -f
//! GeoJSON`). The legacy `crs` member written by those exports is honored;
//! a collection without one is WGS 84 per RFC 7946.

use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, GeoJson};
use serde::{Deserialize, Serialize};
use wildlife_dash_observation_models::{OccurrenceAttributes, SpatialPoint};

use crate::{Crs, GridPolygon, PointSet, SpatialError};

fn default_genus_field() -> String {
    "genus".to_string()
}

fn default_order_field() -> String {
    "order".to_string()
}

fn default_year_field() -> String {
    "year".to_string()
}

fn default_platform_field() -> String {
    "platform".to_string()
}

/// Property names of the occurrence attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceFields {
    /// Property holding the point identity; falls back to the feature id
    /// and then to `occurrence-<index>`.
    #[serde(default)]
    pub id: Option<String>,
    /// Genus property.
    #[serde(default = "default_genus_field")]
    pub genus: String,
    /// Taxonomic order property.
    #[serde(default = "default_order_field")]
    pub order: String,
    /// Year property.
    #[serde(default = "default_year_field")]
    pub year: String,
    /// Publishing platform property.
    #[serde(default = "default_platform_field")]
    pub platform: String,
}

impl Default for OccurrenceFields {
    fn default() -> Self {
        Self {
            id: None,
            genus: default_genus_field(),
            order: default_order_field(),
            year: default_year_field(),
            platform: default_platform_field(),
        }
    }
}

fn parse_collection(geojson_str: &str) -> Result<FeatureCollection, SpatialError> {
    match geojson_str.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => Err(SpatialError::InvalidGeometry {
            feature: "<root>".to_string(),
            message: "expected a FeatureCollection".to_string(),
        }),
    }
}

/// Reads the CRS declared by a collection's legacy `crs` member.
#[must_use]
pub fn collection_crs(collection: &FeatureCollection) -> Crs {
    collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(serde_json::Value::as_str)
        .map_or_else(Crs::wgs84, Crs::new)
}

/// Renders a property value as text. Numbers keep their JSON form.
fn property_text(feature: &Feature, name: &str) -> Option<String> {
    match feature.property(name)? {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn property_year(feature: &Feature, name: &str) -> Option<i32> {
    match feature.property(name)? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .or_else(|| {
                n.as_f64()
                    .filter(|v| v.fract() == 0.0 && v.abs() < f64::from(i32::MAX))
                    .map(|v| v as i32)
            }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn feature_label(feature: &Feature, index: usize) -> String {
    match &feature.id {
        Some(geojson::feature::Id::String(s)) => s.clone(),
        Some(geojson::feature::Id::Number(n)) => n.to_string(),
        None => format!("#{index}"),
    }
}

fn feature_geometry(feature: &Feature, label: &str) -> Result<geo::Geometry<f64>, SpatialError> {
    let geometry = feature
        .geometry
        .clone()
        .ok_or_else(|| SpatialError::InvalidGeometry {
            feature: label.to_string(),
            message: "feature has no geometry".to_string(),
        })?;
    Ok(geometry.try_into()?)
}

/// Parses grid cell polygons from a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`SpatialError::MissingProperty`] for a feature without the
/// id property and [`SpatialError::InvalidGeometry`] for non-polygonal
/// geometry. Nothing is skipped.
pub fn parse_grid_polygons(
    geojson_str: &str,
    id_field: &str,
) -> Result<(Crs, Vec<GridPolygon>), SpatialError> {
    let collection = parse_collection(geojson_str)?;
    let crs = collection_crs(&collection);

    let mut polygons = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.iter().enumerate() {
        let label = feature_label(feature, index);
        let grid_id =
            property_text(feature, id_field).ok_or_else(|| SpatialError::MissingProperty {
                feature: label.clone(),
                property: id_field.to_string(),
            })?;

        let geometry = match feature_geometry(feature, &grid_id)? {
            geo::Geometry::MultiPolygon(mp) => mp,
            geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
            _ => {
                return Err(SpatialError::InvalidGeometry {
                    feature: grid_id,
                    message: "grid cell geometry is not a polygon".to_string(),
                });
            }
        };

        polygons.push(GridPolygon { grid_id, geometry });
    }

    log::debug!("Parsed {} grid polygons in {crs}", polygons.len());
    Ok((crs, polygons))
}

/// Parses occurrence points from a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`SpatialError::InvalidGeometry`] for a feature whose geometry
/// is not a single point. Nothing is skipped.
pub fn parse_occurrence_points(
    geojson_str: &str,
    fields: &OccurrenceFields,
) -> Result<PointSet, SpatialError> {
    let collection = parse_collection(geojson_str)?;
    let crs = collection_crs(&collection);

    let mut points = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.iter().enumerate() {
        let id = fields
            .id
            .as_deref()
            .and_then(|name| property_text(feature, name))
            .or_else(|| feature.id.as_ref().map(|_| feature_label(feature, index)))
            .unwrap_or_else(|| format!("occurrence-{index}"));

        let point = match feature_geometry(feature, &id)? {
            geo::Geometry::Point(p) => p,
            geo::Geometry::MultiPoint(mp) if mp.0.len() == 1 => mp.0[0],
            _ => {
                return Err(SpatialError::InvalidGeometry {
                    feature: id,
                    message: "occurrence geometry is not a single point".to_string(),
                });
            }
        };

        let attributes = OccurrenceAttributes {
            genus: property_text(feature, &fields.genus),
            order: property_text(feature, &fields.order),
            year: property_year(feature, &fields.year),
            platform: property_text(feature, &fields.platform),
        };

        points.push(SpatialPoint::occurrence(id, point.y(), point.x(), attributes));
    }

    log::debug!("Parsed {} occurrence points in {crs}", points.len());
    Ok(PointSet { crs, points })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::25830" } },
        "features": [
            {
                "type": "Feature",
                "properties": { "CUADRICULA": "30SUG28" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [10000, 0], [10000, 10000], [0, 10000], [0, 0]]]
                }
            }
        ]
    }"#;

    const OCCURRENCES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "genus": "Sus", "order": "Artiodactyla", "year": 2019, "platform": "iNaturalist" },
                "geometry": { "type": "Point", "coordinates": [-4.77, 37.88] }
            },
            {
                "type": "Feature",
                "id": "gbif-2",
                "properties": { "genus": "Vulpes", "year": "2021" },
                "geometry": { "type": "Point", "coordinates": [-4.5, 37.6] }
            }
        ]
    }"#;

    #[test]
    fn parses_grid_with_declared_crs() {
        let (crs, polygons) = parse_grid_polygons(GRID, "CUADRICULA").unwrap();
        assert_eq!(crs, Crs::new("EPSG:25830"));
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].grid_id, "30SUG28");
    }

    #[test]
    fn missing_grid_id_property_is_an_error() {
        let err = parse_grid_polygons(GRID, "CELL").unwrap_err();
        assert!(
            matches!(err, SpatialError::MissingProperty { ref property, .. } if property == "CELL"),
            "{err}"
        );
    }

    #[test]
    fn parses_occurrences_with_attributes() {
        let set = parse_occurrence_points(OCCURRENCES, &OccurrenceFields::default()).unwrap();

        assert_eq!(set.crs, Crs::wgs84());
        assert_eq!(set.points.len(), 2);

        let first = &set.points[0];
        assert_eq!(first.id, "occurrence-0");
        assert!((first.longitude - -4.77).abs() < f64::EPSILON);
        assert!((first.latitude - 37.88).abs() < f64::EPSILON);
        let attrs = first.attributes.as_ref().unwrap();
        assert_eq!(attrs.genus.as_deref(), Some("Sus"));
        assert_eq!(attrs.order.as_deref(), Some("Artiodactyla"));
        assert_eq!(attrs.year, Some(2019));
        assert_eq!(attrs.platform.as_deref(), Some("iNaturalist"));

        let second = &set.points[1];
        assert_eq!(second.id, "gbif-2");
        let attrs = second.attributes.as_ref().unwrap();
        assert_eq!(attrs.year, Some(2021));
        assert_eq!(attrs.order, None);
    }

    #[test]
    fn non_point_occurrence_is_rejected() {
        let err = parse_occurrence_points(GRID, &OccurrenceFields::default()).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidGeometry { .. }), "{err}");
    }
}
