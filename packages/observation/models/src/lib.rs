#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Canonical observation record and spatial point types.
//!
//! Every raw input (citizen-science tables, occurrence points, camera
//! sites) is converted into these types once at the load boundary. All
//! downstream components consume only these shapes and never look at raw
//! column names again.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Label used wherever a record or point has no grid cell.
pub const UNASSIGNED_GRID_LABEL: &str = "(unassigned)";

/// Originating platform/category of an observation record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    /// Sequence-based camera trap captures.
    SequenceRecord,
    /// Daily camera trap logs.
    DailyRecord,
    /// Aggregated biodiversity platform (GBIF).
    GlobalBiodiversity,
    /// Citizen platforms without expert validation.
    NoValidation,
}

impl Source {
    /// Returns the human-readable label shown in charts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SequenceRecord => "Sequences Record",
            Self::DailyRecord => "Daily Record",
            Self::GlobalBiodiversity => "Global Biodiversity",
            Self::NoValidation => "No Validation",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::SequenceRecord,
            Self::DailyRecord,
            Self::GlobalBiodiversity,
            Self::NoValidation,
        ]
    }
}

/// Whether a species name resolved to a known canonical label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesStatus {
    /// The name is a configured canonical species (possibly via an alias).
    Canonical,
    /// The name passed through unchanged; nothing in the alias table or
    /// known species list matched it.
    Unmapped,
}

/// One (species, grid, source) tuple with its record count.
///
/// Constructed once by the normalizer and never mutated afterwards; all
/// filtering and aggregation produce new derived views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationRecord {
    /// Canonical species identifier (abbreviated binomial, e.g. `"O. cuniculus"`).
    pub species_name: String,
    /// Whether `species_name` is a known canonical label.
    pub species_status: SpeciesStatus,
    /// 10x10 km grid cell, `None` when no cell could be assigned.
    pub grid_id: Option<String>,
    /// Canonical source.
    pub source: Source,
    /// Number of records for this tuple.
    pub record_count: u64,
}

impl ObservationRecord {
    /// Returns the grid id, or [`UNASSIGNED_GRID_LABEL`] for records
    /// without a cell.
    #[must_use]
    pub fn grid_label(&self) -> &str {
        self.grid_id.as_deref().unwrap_or(UNASSIGNED_GRID_LABEL)
    }
}

/// What a spatial point represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    /// A GBIF-style occurrence.
    Occurrence,
    /// A camera trap deployment site.
    CameraSite,
}

/// Descriptive attributes carried by occurrence points only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceAttributes {
    /// Genus name.
    pub genus: Option<String>,
    /// Taxonomic order.
    pub order: Option<String>,
    /// Observation year.
    pub year: Option<i32>,
    /// Publishing platform (iMammalia, iNaturalist, ...).
    pub platform: Option<String>,
}

/// A single located observation or camera site.
///
/// `longitude` is the x axis and `latitude` the y axis of whatever
/// coordinate reference system the containing point set declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialPoint {
    /// Stable identity used in diagnostics and map popups.
    pub id: String,
    /// Y coordinate.
    pub latitude: f64,
    /// X coordinate.
    pub longitude: f64,
    /// Occurrence or camera site.
    pub kind: PointKind,
    /// Present for occurrence points only.
    pub attributes: Option<OccurrenceAttributes>,
}

impl SpatialPoint {
    /// Creates an occurrence point.
    #[must_use]
    pub fn occurrence(
        id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        attributes: OccurrenceAttributes,
    ) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            kind: PointKind::Occurrence,
            attributes: Some(attributes),
        }
    }

    /// Creates a camera site point.
    #[must_use]
    pub fn camera_site(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            kind: PointKind::CameraSite,
            attributes: None,
        }
    }
}

/// A spatial point together with the grid cell it was joined to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedPoint {
    /// The original point, unchanged.
    pub point: SpatialPoint,
    /// Enclosing cell, `None` when unassigned.
    pub grid_id: Option<String>,
}

/// Genus to silhouette image lookup (cosmetic, used by chart labels).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silhouette {
    /// Genus the image depicts.
    pub genus: String,
    /// Image URL.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn source_parses_its_own_display() {
        for source in Source::all() {
            let parsed = Source::from_str(&source.to_string()).unwrap();
            assert_eq!(parsed, *source);
        }
        assert_eq!(
            Source::from_str("DAILY_RECORD").unwrap(),
            Source::DailyRecord
        );
        assert!(Source::from_str("Daily Record").is_err());
    }

    #[test]
    fn source_labels_are_unique() {
        let mut labels: Vec<&str> = Source::all().iter().map(|s| s.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), Source::all().len());
    }

    #[test]
    fn unassigned_record_uses_sentinel_label() {
        let record = ObservationRecord {
            species_name: "O. cuniculus".to_string(),
            species_status: SpeciesStatus::Canonical,
            grid_id: None,
            source: Source::DailyRecord,
            record_count: 3,
        };
        assert_eq!(record.grid_label(), UNASSIGNED_GRID_LABEL);
    }
}
