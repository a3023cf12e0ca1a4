#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Schema normalizer for the wildlife dashboard inputs.
//!
//! Raw citizen-science rows carry free-form species labels, platform names
//! and count cells. [`Normalizer`] validates them once, loudly, and turns
//! them into canonical [`ObservationRecord`]s. Every row either becomes a
//! record or fails the load; nothing is dropped or zeroed silently, and
//! recoverable deviations are listed in the [`NormalizeReport`].

pub mod count;
pub mod source_label;
pub mod species;
pub mod tabular;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use wildlife_dash_observation_models::{ObservationRecord, Source, SpeciesStatus};

pub use count::parse_record_count;
pub use source_label::SourceLookup;
pub use species::{SpeciesCatalog, canonical_form};
pub use tabular::{
    CameraCsvOptions, RawObservationRow, read_camera_sites, read_observation_rows,
    read_silhouettes,
};

/// Errors raised while reading or normalizing raw rows.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is missing from the input header.
    #[error("Missing required column '{column}'")]
    MissingColumn {
        /// Canonical name of the missing column.
        column: String,
    },

    /// A row has a blank species label.
    #[error("Row {row}: missing species name")]
    MissingSpeciesName {
        /// Line number of the offending row.
        row: u64,
    },

    /// A source label is not in the lookup table and the policy rejects it.
    #[error("Row {row}: unknown source label '{label}'")]
    UnknownSourceLabel {
        /// Line number of the offending row.
        row: u64,
        /// The raw label as read.
        label: String,
    },

    /// A count cell is non-numeric, negative or fractional.
    #[error("Row {row}: invalid record count '{value}'")]
    InvalidRecordCount {
        /// Line number of the offending row.
        row: u64,
        /// The raw cell value.
        value: String,
    },

    /// A count cell is empty and defaulting is not enabled.
    #[error("Row {row}: missing record count")]
    MissingRecordCount {
        /// Line number of the offending row.
        row: u64,
    },

    /// A coordinate cell is empty or unparseable.
    #[error("Row {row}: invalid {column} value '{value}'")]
    InvalidCoordinate {
        /// Line number of the offending row.
        row: u64,
        /// Column the value came from.
        column: String,
        /// The raw cell value.
        value: String,
    },

    /// The configured CSV delimiter is not a single ASCII character.
    #[error("Invalid delimiter '{delimiter}': must be a single ASCII character")]
    InvalidDelimiter {
        /// The configured delimiter.
        delimiter: char,
    },
}

/// What to do with an empty count cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCountPolicy {
    /// Fail with [`NormalizeError::MissingRecordCount`].
    #[default]
    Reject,
    /// Treat the count as zero and list the row in the report.
    Zero,
}

/// What to do with a source label missing from the lookup table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSourcePolicy {
    /// Fail with [`NormalizeError::UnknownSourceLabel`].
    #[default]
    Reject,
    /// Assign the configured catch-all bucket and list the row in the report.
    Coerce,
}

const fn default_coerce_to() -> Source {
    Source::NoValidation
}

/// Normalizer settings, usually read from the dataset TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Empty count handling.
    #[serde(default)]
    pub missing_count: MissingCountPolicy,
    /// Unknown source label handling.
    #[serde(default)]
    pub unknown_source: UnknownSourcePolicy,
    /// Bucket used by [`UnknownSourcePolicy::Coerce`].
    #[serde(default = "default_coerce_to")]
    pub coerce_to: Source,
    /// Extra raw label to source entries layered over the built-in table.
    #[serde(default)]
    pub source_labels: BTreeMap<String, Source>,
    /// Species label variants mapped to their canonical label.
    #[serde(default)]
    pub species_aliases: BTreeMap<String, String>,
    /// Canonical species names.
    #[serde(default)]
    pub known_species: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            missing_count: MissingCountPolicy::default(),
            unknown_source: UnknownSourcePolicy::default(),
            coerce_to: default_coerce_to(),
            source_labels: BTreeMap::new(),
            species_aliases: BTreeMap::new(),
            known_species: Vec::new(),
        }
    }
}

/// A row whose source label was not in the lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLabelIssue {
    /// Line number of the row.
    pub row: u64,
    /// The raw label.
    pub label: String,
    /// Bucket the row was assigned to.
    pub coerced_to: Source,
}

/// Everything the normalizer had to flag while producing records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    /// Raw rows seen.
    pub rows_read: usize,
    /// Records produced (always equal to `rows_read` on success).
    pub records: usize,
    /// Distinct species names that matched no alias or known species.
    pub unmapped_species: BTreeSet<String>,
    /// Rows carrying an unmapped species name.
    pub unmapped_rows: Vec<u64>,
    /// Rows whose source label was coerced into the catch-all bucket.
    pub coerced_sources: Vec<SourceLabelIssue>,
    /// Rows whose empty count was defaulted to zero.
    pub defaulted_counts: Vec<u64>,
}

/// Canonical records plus the normalization report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    /// Canonical records, one per input row.
    pub records: Vec<ObservationRecord>,
    /// Flags raised along the way.
    pub report: NormalizeReport,
}

/// Turns raw citizen-science rows into canonical records.
#[derive(Debug, Clone)]
pub struct Normalizer {
    species: SpeciesCatalog,
    sources: SourceLookup,
    missing_count: MissingCountPolicy,
    unknown_source: UnknownSourcePolicy,
    coerce_to: Source,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl Normalizer {
    /// Builds a normalizer from its configuration.
    #[must_use]
    pub fn new(config: &NormalizerConfig) -> Self {
        let species = SpeciesCatalog::new(
            config
                .species_aliases
                .iter()
                .map(|(from, to)| (from.as_str(), to.as_str())),
            config.known_species.iter().map(String::as_str),
        );
        let sources = SourceLookup::new(
            config
                .source_labels
                .iter()
                .map(|(label, source)| (label.as_str(), *source)),
        );

        Self {
            species,
            sources,
            missing_count: config.missing_count,
            unknown_source: config.unknown_source,
            coerce_to: config.coerce_to,
        }
    }

    /// Normalizes every row.
    ///
    /// # Errors
    ///
    /// Fails on the first row with a blank species, an invalid or (unless
    /// configured) missing count, or (unless configured) an unknown source
    /// label. The error names the offending row.
    pub fn normalize(&self, rows: &[RawObservationRow]) -> Result<NormalizedBatch, NormalizeError> {
        let mut batch = NormalizedBatch {
            records: Vec::with_capacity(rows.len()),
            report: NormalizeReport {
                rows_read: rows.len(),
                ..NormalizeReport::default()
            },
        };

        for row in rows {
            let record = self.normalize_row(row, &mut batch.report)?;
            batch.records.push(record);
        }
        batch.report.records = batch.records.len();

        if !batch.report.unmapped_species.is_empty() {
            log::warn!(
                "{} species names are not in the catalog ({} rows): {:?}",
                batch.report.unmapped_species.len(),
                batch.report.unmapped_rows.len(),
                batch.report.unmapped_species
            );
        }
        if !batch.report.coerced_sources.is_empty() {
            log::warn!(
                "{} rows had unknown source labels and were assigned to {}",
                batch.report.coerced_sources.len(),
                self.coerce_to.label()
            );
        }
        if !batch.report.defaulted_counts.is_empty() {
            log::warn!(
                "{} rows had empty record counts and were set to 0",
                batch.report.defaulted_counts.len()
            );
        }
        log::info!(
            "Normalized {} observation records",
            batch.report.records
        );

        Ok(batch)
    }

    fn normalize_row(
        &self,
        row: &RawObservationRow,
        report: &mut NormalizeReport,
    ) -> Result<ObservationRecord, NormalizeError> {
        let (species_name, species_status) = row
            .species_name
            .as_deref()
            .and_then(|raw| self.species.resolve(raw))
            .ok_or(NormalizeError::MissingSpeciesName { row: row.row })?;

        if species_status == SpeciesStatus::Unmapped {
            report.unmapped_species.insert(species_name.clone());
            report.unmapped_rows.push(row.row);
        }

        let source = self.resolve_source(row, report)?;
        let record_count = self.resolve_count(row, report)?;

        Ok(ObservationRecord {
            species_name,
            species_status,
            grid_id: row.grid_id.as_deref().map(str::trim).map(ToString::to_string),
            source,
            record_count,
        })
    }

    fn resolve_source(
        &self,
        row: &RawObservationRow,
        report: &mut NormalizeReport,
    ) -> Result<Source, NormalizeError> {
        let label = row.source_label.as_deref().unwrap_or_default();
        if let Some(source) = self.sources.lookup(label) {
            return Ok(source);
        }

        match self.unknown_source {
            UnknownSourcePolicy::Reject => Err(NormalizeError::UnknownSourceLabel {
                row: row.row,
                label: label.to_string(),
            }),
            UnknownSourcePolicy::Coerce => {
                report.coerced_sources.push(SourceLabelIssue {
                    row: row.row,
                    label: label.to_string(),
                    coerced_to: self.coerce_to,
                });
                Ok(self.coerce_to)
            }
        }
    }

    fn resolve_count(
        &self,
        row: &RawObservationRow,
        report: &mut NormalizeReport,
    ) -> Result<u64, NormalizeError> {
        let Some(raw) = row.record_count.as_deref().filter(|s| !s.trim().is_empty()) else {
            return match self.missing_count {
                MissingCountPolicy::Reject => {
                    Err(NormalizeError::MissingRecordCount { row: row.row })
                }
                MissingCountPolicy::Zero => {
                    report.defaulted_counts.push(row.row);
                    Ok(0)
                }
            };
        };

        parse_record_count(raw).ok_or_else(|| NormalizeError::InvalidRecordCount {
            row: row.row,
            value: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(row: u64, species: &str, grid: &str, source: &str, count: &str) -> RawObservationRow {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        RawObservationRow {
            row,
            species_name: opt(species),
            grid_id: opt(grid),
            source_label: opt(source),
            record_count: opt(count),
        }
    }

    fn config() -> NormalizerConfig {
        NormalizerConfig {
            species_aliases: [("Oryctolagus cuniculus", "O. cuniculus")]
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            known_species: vec!["S. scrofa".to_string()],
            ..NormalizerConfig::default()
        }
    }

    #[test]
    fn produces_canonical_records() {
        let normalizer = Normalizer::new(&config());
        let batch = normalizer
            .normalize(&[
                row(2, "Oryctolagus_cuniculus", "G1", "Daily Record", "10"),
                row(3, "S.scrofa", "", "SEQUENCES RECORD", "5.0"),
            ])
            .unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].species_name, "O. cuniculus");
        assert_eq!(batch.records[0].source, Source::DailyRecord);
        assert_eq!(batch.records[0].record_count, 10);
        assert_eq!(batch.records[1].species_name, "S. scrofa");
        assert_eq!(batch.records[1].grid_id, None);
        assert_eq!(batch.records[1].source, Source::SequenceRecord);
        assert_eq!(batch.records[1].record_count, 5);
        assert!(batch.report.unmapped_species.is_empty());
    }

    #[test]
    fn unmapped_species_are_kept_and_reported() {
        let normalizer = Normalizer::new(&config());
        let batch = normalizer
            .normalize(&[row(2, "V.vulpes", "G1", "Daily Record", "1")])
            .unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].species_name, "V.vulpes");
        assert_eq!(batch.records[0].species_status, SpeciesStatus::Unmapped);
        assert!(batch.report.unmapped_species.contains("V.vulpes"));
        assert_eq!(batch.report.unmapped_rows, vec![2]);
    }

    #[test]
    fn unknown_source_rejected_by_default() {
        let normalizer = Normalizer::new(&config());
        let err = normalizer
            .normalize(&[row(7, "S.scrofa", "G1", "iNaturalist", "1")])
            .unwrap_err();
        assert!(
            matches!(err, NormalizeError::UnknownSourceLabel { row: 7, ref label } if label == "iNaturalist"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn unknown_source_coerced_when_configured() {
        let normalizer = Normalizer::new(&NormalizerConfig {
            unknown_source: UnknownSourcePolicy::Coerce,
            ..config()
        });
        let batch = normalizer
            .normalize(&[
                row(2, "S.scrofa", "G1", "iNaturalist", "1"),
                row(3, "S.scrofa", "G1", "Daily Record", "1"),
            ])
            .unwrap();

        assert_eq!(batch.records[0].source, Source::NoValidation);
        assert_eq!(
            batch.report.coerced_sources,
            vec![SourceLabelIssue {
                row: 2,
                label: "iNaturalist".to_string(),
                coerced_to: Source::NoValidation,
            }]
        );
    }

    #[test]
    fn invalid_counts_fail_with_row() {
        let normalizer = Normalizer::new(&config());
        for bad in ["-1", "abc", "1.5"] {
            let err = normalizer
                .normalize(&[row(4, "S.scrofa", "G1", "Daily Record", bad)])
                .unwrap_err();
            assert!(
                matches!(err, NormalizeError::InvalidRecordCount { row: 4, ref value } if value == bad),
                "unexpected error for {bad}: {err}"
            );
        }
    }

    #[test]
    fn missing_count_needs_explicit_policy() {
        let rows = [row(5, "S.scrofa", "G1", "Daily Record", "")];

        let err = Normalizer::new(&config()).normalize(&rows).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingRecordCount { row: 5 }));

        let batch = Normalizer::new(&NormalizerConfig {
            missing_count: MissingCountPolicy::Zero,
            ..config()
        })
        .normalize(&rows)
        .unwrap();
        assert_eq!(batch.records[0].record_count, 0);
        assert_eq!(batch.report.defaulted_counts, vec![5]);
    }

    #[test]
    fn blank_species_is_an_error() {
        let err = Normalizer::new(&config())
            .normalize(&[row(9, "  ", "G1", "Daily Record", "1")])
            .unwrap_err();
        assert!(matches!(err, NormalizeError::MissingSpeciesName { row: 9 }));
    }
}
