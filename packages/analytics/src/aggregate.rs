//! Aggregation engine.
//!
//! Records are merged into groups keyed by the requested dimensions. Groups
//! live in a `BTreeMap`, so merging never depends on input order, and the
//! final sort is descending by total with an ascending key tie-break.

use std::collections::{BTreeMap, BTreeSet};

use wildlife_dash_analytics_models::{
    AggregateKey, AggregateRow, AggregateView, Dimension, GroupBy, KeyPart,
};
use wildlife_dash_observation_models::{ObservationRecord, Source};

#[derive(Default)]
struct GroupAccumulator<'a> {
    total_records: u64,
    record_rows: u64,
    species: BTreeSet<&'a str>,
    grids: BTreeSet<&'a str>,
    sources: BTreeSet<Source>,
}

impl<'a> GroupAccumulator<'a> {
    fn add(&mut self, record: &'a ObservationRecord) {
        self.total_records = self.total_records.saturating_add(record.record_count);
        self.record_rows += 1;
        self.species.insert(&record.species_name);
        if let Some(grid_id) = &record.grid_id {
            self.grids.insert(grid_id);
        }
        self.sources.insert(record.source);
    }

    fn into_row(self, key: AggregateKey, group_by: &GroupBy) -> AggregateRow {
        let distinct = |dimension: Dimension, len: usize| {
            (!group_by.fixes(dimension)).then_some(len as u64)
        };

        AggregateRow {
            key,
            total_records: self.total_records,
            record_rows: self.record_rows,
            distinct_species: distinct(Dimension::Species, self.species.len()),
            distinct_grids: distinct(Dimension::Grid, self.grids.len()),
            distinct_sources: distinct(Dimension::Source, self.sources.len()),
        }
    }
}

/// Builds the grouping key of `record`.
#[must_use]
pub fn key_for(record: &ObservationRecord, group_by: &GroupBy) -> AggregateKey {
    AggregateKey(
        group_by
            .dimensions()
            .iter()
            .map(|dimension| match dimension {
                Dimension::Species => KeyPart::Species(record.species_name.clone()),
                Dimension::Grid => KeyPart::Grid(record.grid_id.clone()),
                Dimension::Source => KeyPart::Source(record.source),
            })
            .collect(),
    )
}

/// Groups `records` by `group_by`.
///
/// Rows are sorted by descending `total_records`, ties broken by ascending
/// key. Empty input yields an empty view.
#[must_use]
pub fn aggregate<'a>(
    records: impl IntoIterator<Item = &'a ObservationRecord>,
    group_by: &GroupBy,
) -> AggregateView {
    let mut groups: BTreeMap<AggregateKey, GroupAccumulator<'a>> = BTreeMap::new();
    let mut total_records = 0_u64;

    for record in records {
        total_records = total_records.saturating_add(record.record_count);
        groups
            .entry(key_for(record, group_by))
            .or_default()
            .add(record);
    }

    let mut rows: Vec<AggregateRow> = groups
        .into_iter()
        .map(|(key, acc)| acc.into_row(key, group_by))
        .collect();
    sort_rows(&mut rows);

    log::debug!(
        "Aggregated {total_records} records into {} groups by {group_by}",
        rows.len()
    );

    AggregateView {
        group_by: group_by.clone(),
        rows,
        total_records,
    }
}

/// Descending by total, ascending by key.
pub fn sort_rows(rows: &mut [AggregateRow]) {
    rows.sort_by(|a, b| {
        b.total_records
            .cmp(&a.total_records)
            .then_with(|| a.key.cmp(&b.key))
    });
}

#[cfg(test)]
mod tests {
    use wildlife_dash_analytics_models::FilterSpec;
    use wildlife_dash_observation_models::SpeciesStatus;

    use super::*;
    use crate::filter;

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
            record("O. cuniculus", Some("30SUG39"), Source::SequenceRecord, 12),
            record("S. scrofa", Some("30SUG28"), Source::DailyRecord, 7),
            record("S. scrofa", None, Source::NoValidation, 5),
            record("V. vulpes", Some("30SUG39"), Source::GlobalBiodiversity, 12),
            record("L. granatensis", Some("30SUG28"), Source::SequenceRecord, 0),
        ]
    }

    fn by(dimensions: &[Dimension]) -> GroupBy {
        GroupBy::new(dimensions.to_vec()).unwrap()
    }

    fn labels(view: &AggregateView) -> Vec<String> {
        view.rows.iter().map(|row| row.key.to_string()).collect()
    }

    #[test]
    fn scenario_a_merges_sources() {
        let records = vec![
            record("X", Some("G1"), Source::DailyRecord, 10),
            record("X", Some("G1"), Source::SequenceRecord, 5),
        ];
        let view = aggregate(&records, &by(&[Dimension::Species]));

        assert_eq!(view.len(), 1);
        let row = &view.rows[0];
        assert_eq!(row.key.to_string(), "X");
        assert_eq!(row.total_records, 15);
        assert_eq!(row.distinct_sources, Some(2));
        assert_eq!(row.distinct_grids, Some(1));
        assert_eq!(row.distinct_species, None);
        assert_eq!(row.record_rows, 2);
    }

    #[test]
    fn scenario_b_min_count_changes_the_sum() {
        let records = vec![
            record("X", Some("G1"), Source::DailyRecord, 10),
            record("X", Some("G1"), Source::SequenceRecord, 5),
        ];
        let spec = FilterSpec {
            min_count: 6,
            ..FilterSpec::default()
        };
        let filtered = filter::apply(&spec, &records);
        let view = aggregate(filtered.records.iter().copied(), &by(&[Dimension::Species]));

        assert_eq!(view.rows[0].total_records, 10);
        assert_eq!(view.rows[0].distinct_sources, Some(1));
    }

    #[test]
    fn totals_are_conserved_for_every_grouping() {
        let records = sample();
        let expected: u64 = records.iter().map(|r| r.record_count).sum();

        let groupings = [
            vec![Dimension::Species],
            vec![Dimension::Grid],
            vec![Dimension::Source],
            vec![Dimension::Species, Dimension::Grid],
            vec![Dimension::Grid, Dimension::Source, Dimension::Species],
        ];
        for dimensions in groupings {
            let view = aggregate(&records, &by(&dimensions));
            let sum: u64 = view.rows.iter().map(|row| row.total_records).sum();
            assert_eq!(sum, expected, "{dimensions:?}");
            assert_eq!(view.total_records, expected, "{dimensions:?}");
        }
    }

    #[test]
    fn same_input_yields_identical_views() {
        let records = sample();
        let group_by = by(&[Dimension::Grid]);
        assert_eq!(aggregate(&records, &group_by), aggregate(&records, &group_by));
    }

    #[test]
    fn ordering_ignores_input_order() {
        let records = sample();
        let mut reversed = records.clone();
        reversed.reverse();

        for dimensions in [vec![Dimension::Species], vec![Dimension::Source, Dimension::Grid]] {
            let group_by = by(&dimensions);
            assert_eq!(aggregate(&records, &group_by), aggregate(&reversed, &group_by));
        }
    }

    #[test]
    fn ties_break_by_ascending_key() {
        let view = aggregate(&sample(), &by(&[Dimension::Species]));
        assert_eq!(
            labels(&view),
            vec!["O. cuniculus", "S. scrofa", "V. vulpes", "L. granatensis"]
        );
        assert_eq!(view.rows[1].total_records, 12);
        assert_eq!(view.rows[2].total_records, 12);
    }

    #[test]
    fn unassigned_records_form_their_own_group() {
        let view = aggregate(&sample(), &by(&[Dimension::Grid]));
        let unassigned = view
            .get(&AggregateKey(vec![KeyPart::Grid(None)]))
            .unwrap();
        assert_eq!(unassigned.total_records, 5);
        assert_eq!(unassigned.distinct_species, Some(1));
        assert_eq!(labels(&view), vec!["30SUG28", "30SUG39", "(unassigned)"]);
    }

    #[test]
    fn distinct_grids_skip_unassigned() {
        let view = aggregate(&sample(), &by(&[Dimension::Species]));
        let scrofa = view
            .get(&AggregateKey(vec![KeyPart::Species("S. scrofa".to_string())]))
            .unwrap();
        assert_eq!(scrofa.distinct_grids, Some(1));
        assert_eq!(scrofa.distinct_sources, Some(2));
    }

    #[test]
    fn composite_keys_fix_every_listed_dimension() {
        let view = aggregate(&sample(), &by(&[Dimension::Species, Dimension::Source]));
        for row in &view.rows {
            assert_eq!(row.distinct_species, None);
            assert_eq!(row.distinct_sources, None);
            assert!(row.distinct_grids.is_some());
        }
        assert_eq!(view.rows[0].key.to_string(), "O. cuniculus / DAILY_RECORD");
    }

    #[test]
    fn empty_input_yields_empty_view() {
        let view = aggregate(std::iter::empty(), &by(&[Dimension::Species]));
        assert!(view.is_empty());
        assert_eq!(view.total_records, 0);
    }
}
