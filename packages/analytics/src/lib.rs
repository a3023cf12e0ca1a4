#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analytics engine for the wildlife dashboard.
//!
//! Every function takes the canonical records by shared reference and
//! returns a freshly built result. Nothing is cached or mutated between
//! calls, so a [`recompute`] pass is idempotent and the renderer never sees
//! a half-updated set of views.

pub mod aggregate;
pub mod correlation;
pub mod filter;
pub mod occurrence;
pub mod summary;

use thiserror::Error;
use wildlife_dash_analytics_models::{
    DashboardViews, Dimension, GroupBy, InvalidGroupingError, ViewRequest,
};
use wildlife_dash_observation_models::{ObservationRecord, Source};

pub use aggregate::aggregate;
pub use correlation::{correlate, correlate_sources, correlate_views};
pub use filter::FilterOutcome;
pub use occurrence::{accumulation_by_group, attribute_counts, yearly_accumulation};
pub use summary::{catalog, distribution, source_shares, summarize};

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Two views that must share a grouping do not.
    #[error("Grouping mismatch: expected '{expected}', found '{found}'")]
    GroupingMismatch {
        /// Grouping that was required.
        expected: String,
        /// Grouping that was supplied.
        found: String,
    },

    /// A correlation was requested between a source and itself.
    #[error("Cannot correlate source {selected} with itself")]
    IdenticalSources {
        /// The repeated source.
        selected: Source,
    },

    /// A grouping was empty or repeated a dimension.
    #[error(transparent)]
    InvalidGrouping(#[from] InvalidGroupingError),
}

/// Runs one full pass: filter, the three single-dimension aggregates,
/// source shares, summary and the optional correlation.
///
/// # Errors
///
/// Returns [`AnalyticsError::IdenticalSources`] if the correlation request
/// names the same source twice.
pub fn recompute(
    records: &[ObservationRecord],
    request: &ViewRequest,
) -> Result<DashboardViews, AnalyticsError> {
    let filtered = filter::apply(&request.filter, records);
    let passing = filtered.records.iter().copied();

    let by_species = aggregate(passing.clone(), &GroupBy::single(Dimension::Species));
    let by_grid = aggregate(passing.clone(), &GroupBy::single(Dimension::Grid));
    let by_source = aggregate(passing.clone(), &GroupBy::single(Dimension::Source));
    let source_shares = source_shares(&by_source)?;
    let summary = summarize(passing.clone(), request.top_n);

    let correlation = request
        .correlation
        .as_ref()
        .map(|correlation| correlate_sources(passing, correlation))
        .transpose()?;

    log::debug!(
        "Recomputed views over {} of {} records ({} total)",
        filtered.records.len(),
        records.len(),
        summary.total_records
    );

    Ok(DashboardViews {
        filtered_records: filtered.records.len(),
        excluded_records: filtered.excluded,
        by_species,
        by_grid,
        by_source,
        source_shares,
        summary,
        correlation,
    })
}

#[cfg(test)]
mod tests {
    use wildlife_dash_analytics_models::{
        AggregateKey, CorrelationRequest, FilterSpec, KeyPart, Selection,
    };
    use wildlife_dash_observation_models::SpeciesStatus;

    use super::*;

    fn record(species: &str, grid: Option<&str>, source: Source, count: u64) -> ObservationRecord {
        ObservationRecord {
            species_name: species.to_string(),
            species_status: SpeciesStatus::Canonical,
            grid_id: grid.map(ToString::to_string),
            source,
            record_count: count,
        }
    }

    fn sample() -> Vec<ObservationRecord> {
        vec![
            record("O. cuniculus", Some("30SUG28"), Source::DailyRecord, 40),
            record("O. cuniculus", Some("30SUG28"), Source::SequenceRecord, 22),
            record("S. scrofa", Some("30SUG39"), Source::DailyRecord, 9),
            record("S. scrofa", Some("30SUG39"), Source::SequenceRecord, 4),
            record("V. vulpes", Some("30SUG39"), Source::DailyRecord, 3),
            record("V. vulpes", None, Source::SequenceRecord, 2),
            record("M. meles", Some("30SUG28"), Source::GlobalBiodiversity, 1),
        ]
    }

    #[test]
    fn every_view_conserves_the_filtered_total() {
        let records = sample();
        let request = ViewRequest {
            filter: FilterSpec {
                min_count: 3,
                ..FilterSpec::default()
            },
            ..ViewRequest::default()
        };
        let views = recompute(&records, &request).unwrap();

        let expected: u64 = records
            .iter()
            .filter(|r| r.record_count >= 3)
            .map(|r| r.record_count)
            .sum();
        assert_eq!(views.summary.total_records, expected);
        for view in [&views.by_species, &views.by_grid, &views.by_source] {
            let sum: u64 = view.rows.iter().map(|row| row.total_records).sum();
            assert_eq!(sum, expected);
        }
        assert_eq!(views.filtered_records, 5);
        assert_eq!(views.excluded_records, 2);
    }

    #[test]
    fn recompute_is_idempotent() {
        let records = sample();
        let request = ViewRequest {
            filter: FilterSpec {
                sources: Selection::from_values([Source::DailyRecord, Source::SequenceRecord]),
                ..FilterSpec::default()
            },
            ..ViewRequest::default()
        };
        let first = recompute(&records, &request).unwrap();
        let second = recompute(&records, &request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn default_request_correlates_daily_against_sequences() {
        let records = sample();
        let views = recompute(&records, &ViewRequest::default()).unwrap();

        let correlation = views.correlation.unwrap();
        assert_eq!(correlation.all.pairs.len(), 3);
        let first = &correlation.all.pairs[0];
        assert_eq!(
            first.key,
            AggregateKey(vec![KeyPart::Species("O. cuniculus".to_string())])
        );
        assert_eq!((first.value_a, first.value_b), (40, 22));

        let outliers = correlation.excluding_outliers.unwrap();
        assert_eq!(outliers.excluded[0].key, first.key);
        assert_eq!(outliers.remaining.pairs.len(), 2);
    }

    #[test]
    fn correlation_can_be_skipped() {
        let request = ViewRequest {
            correlation: None,
            ..ViewRequest::default()
        };
        let views = recompute(&sample(), &request).unwrap();
        assert!(views.correlation.is_none());
    }

    #[test]
    fn filter_that_matches_nothing_gives_empty_views() {
        let request = ViewRequest {
            filter: FilterSpec {
                species: Selection::from_values(["Z. unknown".to_string()]),
                ..FilterSpec::default()
            },
            ..ViewRequest::default()
        };
        let views = recompute(&sample(), &request).unwrap();

        assert!(views.by_species.is_empty());
        assert!(views.source_shares.is_empty());
        assert_eq!(views.summary.total_records, 0);
        let correlation = views.correlation.unwrap();
        assert!(correlation.all.outcome.pearson_r().is_none());
    }

    #[test]
    fn identical_correlation_sources_fail() {
        let request = ViewRequest {
            correlation: Some(CorrelationRequest {
                source_a: Source::NoValidation,
                source_b: Source::NoValidation,
                exclude_top: 0,
            }),
            ..ViewRequest::default()
        };
        assert!(matches!(
            recompute(&sample(), &request),
            Err(AnalyticsError::IdenticalSources { .. })
        ));
    }
}
