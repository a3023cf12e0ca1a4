//! Filter engine.
//!
//! Clauses combine with AND; each set clause is OR over its members. The
//! minimum count is checked against each record's own `record_count`
//! before any aggregation happens.

use wildlife_dash_analytics_models::FilterSpec;
use wildlife_dash_observation_models::ObservationRecord;

/// Records that passed a filter, borrowed from the base dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome<'a> {
    /// Passing records, in input order.
    pub records: Vec<&'a ObservationRecord>,
    /// Number of records the filter excluded.
    pub excluded: usize,
}

impl FilterOutcome<'_> {
    /// Sum of `record_count` over the passing records.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.records.iter().map(|r| r.record_count).sum()
    }
}

/// Whether a single record satisfies every clause of `spec`.
#[must_use]
pub fn matches(spec: &FilterSpec, record: &ObservationRecord) -> bool {
    if record.record_count < spec.min_count {
        return false;
    }
    if !spec.species.matches(record.species_name.as_str()) {
        return false;
    }
    if !spec.sources.matches(&record.source) {
        return false;
    }
    // A record without a grid only passes when the grid clause is open.
    match &record.grid_id {
        Some(grid_id) => spec.grids.matches(grid_id.as_str()),
        None => spec.grids.is_all(),
    }
}

/// Applies `spec` to `records` without copying or mutating them.
#[must_use]
pub fn apply<'a>(spec: &FilterSpec, records: &'a [ObservationRecord]) -> FilterOutcome<'a> {
    let passing: Vec<&ObservationRecord> =
        records.iter().filter(|record| matches(spec, record)).collect();
    let excluded = records.len() - passing.len();

    log::debug!(
        "Filter kept {} of {} records ({excluded} excluded)",
        passing.len(),
        records.len()
    );

    FilterOutcome {
        records: passing,
        excluded,
    }
}
