//! Headline statistics, filter catalogues, source shares and count
//! distributions.

use std::collections::{BTreeMap, BTreeSet};

use wildlife_dash_analytics_models::{
    AggregateView, Catalog, CountDistribution, Dimension, DistributionReport, GridCoverage,
    GroupBy, HistogramBin, KeyPart, RankedCount, SourceDistribution, SourceShare, SummaryStats,
};
use wildlife_dash_observation_models::{ObservationRecord, Source};

use crate::{AnalyticsError, aggregate::aggregate};

fn ranked(view: &AggregateView, top_n: usize, skip_unassigned: bool) -> Vec<RankedCount> {
    view.rows
        .iter()
        .filter(|row| !(skip_unassigned && row.key.0 == [KeyPart::Grid(None)]))
        .take(top_n)
        .map(|row| RankedCount {
            label: row.key.to_string(),
            count: row.total_records,
        })
        .collect()
}

/// Computes headline numbers over `records`.
///
/// `top_grids` never lists the unassigned group; `unique_grids` counts
/// assigned cells only.
#[must_use]
pub fn summarize<'a>(
    records: impl IntoIterator<Item = &'a ObservationRecord> + Clone,
    top_n: usize,
) -> SummaryStats {
    let mut species = BTreeSet::new();
    let mut grids = BTreeSet::new();
    let mut sources = BTreeSet::new();
    let mut richness: BTreeMap<Source, BTreeSet<&str>> = BTreeMap::new();
    let mut total_records = 0_u64;

    for record in records.clone() {
        total_records = total_records.saturating_add(record.record_count);
        species.insert(record.species_name.as_str());
        if let Some(grid_id) = &record.grid_id {
            grids.insert(grid_id.as_str());
        }
        sources.insert(record.source);
        richness
            .entry(record.source)
            .or_default()
            .insert(record.species_name.as_str());
    }

    let by_species = aggregate(records.clone(), &GroupBy::single(Dimension::Species));
    let by_grid = aggregate(records, &GroupBy::single(Dimension::Grid));

    SummaryStats {
        total_records,
        unique_species: species.len() as u64,
        unique_grids: grids.len() as u64,
        unique_sources: sources.len() as u64,
        species_richness_by_source: richness
            .into_iter()
            .map(|(source, names)| (source, names.len() as u64))
            .collect(),
        top_species: ranked(&by_species, top_n, false),
        top_grids: ranked(&by_grid, top_n, true),
    }
}

/// Distinct species, assigned grids and sources present in `records`.
#[must_use]
pub fn catalog<'a>(records: impl IntoIterator<Item = &'a ObservationRecord>) -> Catalog {
    let mut species = BTreeSet::new();
    let mut grids = BTreeSet::new();
    let mut sources = BTreeSet::new();

    for record in records {
        species.insert(record.species_name.clone());
        if let Some(grid_id) = &record.grid_id {
            grids.insert(grid_id.clone());
        }
        sources.insert(record.source);
    }

    Catalog {
        species: species.into_iter().collect(),
        grids: grids.into_iter().collect(),
        sources: sources.into_iter().collect(),
    }
}

/// Per-source share of the view total, in the view's row order.
///
/// # Errors
///
/// Returns [`AnalyticsError::GroupingMismatch`] unless `view` is grouped by
/// source alone.
#[allow(clippy::cast_precision_loss)]
pub fn source_shares(view: &AggregateView) -> Result<Vec<SourceShare>, AnalyticsError> {
    let expected = GroupBy::single(Dimension::Source);
    if view.group_by != expected {
        return Err(AnalyticsError::GroupingMismatch {
            expected: expected.to_string(),
            found: view.group_by.to_string(),
        });
    }

    Ok(view
        .rows
        .iter()
        .filter_map(|row| match row.key.0.as_slice() {
            [KeyPart::Source(source)] => Some(SourceShare {
                source: *source,
                total_records: row.total_records,
                percent: view.percent_of_total(row),
            }),
            _ => None,
        })
        .collect())
}

/// Linear interpolation between the two ranks nearest `p` in `sorted`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[u64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let position = p * last as f64;
    let lower = position.floor() as usize;
    let low = *sorted.get(lower)? as f64;
    let high = *sorted.get(position.ceil() as usize)? as f64;
    Some((high - low).mul_add(position - lower as f64, low))
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn histogram(sorted: &[u64], bins: usize) -> Vec<HistogramBin> {
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }
    if min == max {
        return vec![HistogramBin {
            lower: min as f64,
            upper: max as f64,
            count: sorted.len() as u64,
        }];
    }

    let lower = min as f64;
    let width = (max - min) as f64 / bins as f64;
    let mut counts = vec![0_u64; bins];
    for &value in sorted {
        let index = (((value - min) as f64 / width) as usize).min(bins - 1);
        if let Some(slot) = counts.get_mut(index) {
            *slot += 1;
        }
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: width.mul_add(i as f64, lower),
            upper: width.mul_add((i + 1) as f64, lower),
            count,
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn describe(mut values: Vec<u64>, bins: usize) -> Option<CountDistribution> {
    values.sort_unstable();
    let (&min, &max) = (values.first()?, values.last()?);

    let n = values.len() as f64;
    let total_records = values.iter().fold(0_u64, |acc, &v| acc.saturating_add(v));
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;

    let (mut m2, mut m3) = (0.0_f64, 0.0_f64);
    for &value in &values {
        let d = value as f64 - mean;
        m2 = d.mul_add(d, m2);
        m3 = (d * d).mul_add(d, m3);
    }

    let std_dev = (values.len() >= 2).then(|| (m2 / (n - 1.0)).sqrt());
    let skewness = (values.len() >= 3).then(|| {
        if m2 == 0.0 {
            0.0
        } else {
            n * (n - 1.0).sqrt() / (n - 2.0) * (m3 / m2.powf(1.5))
        }
    });

    Some(CountDistribution {
        rows: values.len() as u64,
        total_records,
        mean,
        std_dev,
        min,
        q1: quantile(&values, 0.25)?,
        median: quantile(&values, 0.5)?,
        q3: quantile(&values, 0.75)?,
        max,
        skewness,
        histogram: histogram(&values, bins),
    })
}

#[allow(clippy::cast_precision_loss)]
fn grid_coverage(view: &AggregateView) -> Option<GridCoverage> {
    let cells: Vec<(&str, u64, u64)> = view
        .rows
        .iter()
        .filter_map(|row| match row.key.0.as_slice() {
            [KeyPart::Grid(Some(grid_id))] => Some((
                grid_id.as_str(),
                row.total_records,
                row.distinct_species.unwrap_or(0),
            )),
            _ => None,
        })
        .collect();
    let &(richest, ..) = cells.first()?;

    let n = cells.len() as f64;
    let mut totals: Vec<u64> = cells.iter().map(|&(_, total, _)| total).collect();
    totals.sort_unstable();
    let q1_records = quantile(&totals, 0.25)?;
    let q3_records = quantile(&totals, 0.75)?;

    Some(GridCoverage {
        grids: cells.len() as u64,
        mean_species_per_grid: cells.iter().map(|&(.., species)| species as f64).sum::<f64>()
            / n,
        mean_records_per_grid: totals.iter().map(|&t| t as f64).sum::<f64>() / n,
        richest_grid: richest.to_string(),
        q1_records,
        q3_records,
        high_coverage_grids: totals.iter().filter(|&&t| t as f64 > q3_records).count() as u64,
        low_coverage_grids: totals.iter().filter(|&&t| (t as f64) < q1_records).count() as u64,
    })
}

/// Per-source distribution of individual record counts, and how the
/// records spread over the assigned grid cells.
///
/// Every source appears in the report, with `None` when it has no records.
/// Unassigned records count toward their source but not toward grid
/// coverage.
#[must_use]
pub fn distribution<'a>(
    records: impl IntoIterator<Item = &'a ObservationRecord> + Clone,
    bins: usize,
) -> DistributionReport {
    let mut counts: BTreeMap<Source, Vec<u64>> = BTreeMap::new();
    for record in records.clone() {
        counts
            .entry(record.source)
            .or_default()
            .push(record.record_count);
    }

    let by_source = Source::all()
        .iter()
        .map(|&source| SourceDistribution {
            source,
            distribution: counts
                .remove(&source)
                .and_then(|values| describe(values, bins)),
        })
        .collect();

    let by_grid = aggregate(records, &GroupBy::single(Dimension::Grid));

    DistributionReport {
        bins,
        by_source,
        grid_coverage: grid_coverage(&by_grid),
    }
}

#[cfg(test)]
mod tests {
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
            record("O. cuniculus", Some("30SUG28"), Source::DailyRecord, 30),
            record("O. cuniculus", Some("30SUG39"), Source::SequenceRecord, 10),
            record("S. scrofa", Some("30SUG39"), Source::DailyRecord, 8),
            record("S. scrofa", None, Source::NoValidation, 50),
            record("V. vulpes", Some("30SUG28"), Source::DailyRecord, 2),
        ]
    }

    #[test]
    fn summarize_counts_uniques() {
        let records = sample();
        let stats = summarize(&records, 2);

        assert_eq!(stats.total_records, 100);
        assert_eq!(stats.unique_species, 3);
        assert_eq!(stats.unique_grids, 2);
        assert_eq!(stats.unique_sources, 3);
        assert_eq!(
            stats.species_richness_by_source.get(&Source::DailyRecord),
            Some(&3)
        );
        assert_eq!(
            stats.species_richness_by_source.get(&Source::SequenceRecord),
            Some(&1)
        );
        assert_eq!(
            stats.species_richness_by_source.get(&Source::GlobalBiodiversity),
            None
        );
    }

    #[test]
    fn top_lists_follow_aggregate_order() {
        let records = sample();
        let stats = summarize(&records, 2);

        let species: Vec<(&str, u64)> = stats
            .top_species
            .iter()
            .map(|r| (r.label.as_str(), r.count))
            .collect();
        assert_eq!(species, vec![("S. scrofa", 58), ("O. cuniculus", 40)]);

        // The unassigned group holds 50 records but is not a grid cell.
        let grids: Vec<(&str, u64)> = stats
            .top_grids
            .iter()
            .map(|r| (r.label.as_str(), r.count))
            .collect();
        assert_eq!(grids, vec![("30SUG28", 32), ("30SUG39", 18)]);
    }

    #[test]
    fn summarize_empty_input() {
        let stats = summarize(&Vec::<ObservationRecord>::new(), 5);
        assert_eq!(stats, SummaryStats::default());
    }

    #[test]
    fn catalog_is_sorted_and_skips_unassigned() {
        let catalog = catalog(&sample());
        assert_eq!(catalog.species, vec!["O. cuniculus", "S. scrofa", "V. vulpes"]);
        assert_eq!(catalog.grids, vec!["30SUG28", "30SUG39"]);
        assert_eq!(
            catalog.sources,
            vec![Source::SequenceRecord, Source::DailyRecord, Source::NoValidation]
        );
    }

    #[test]
    fn shares_sum_to_one_hundred() {
        let records = sample();
        let view = aggregate(&records, &GroupBy::single(Dimension::Source));
        let shares = source_shares(&view).unwrap();

        assert_eq!(shares[0].source, Source::NoValidation);
        assert!((shares[0].percent - 50.0).abs() < 1e-9);
        let total: f64 = shares.iter().map(|s| s.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn shares_need_a_source_view() {
        let records = sample();
        let view = aggregate(&records, &GroupBy::single(Dimension::Species));
        assert!(matches!(
            source_shares(&view),
            Err(AnalyticsError::GroupingMismatch { .. })
        ));
    }

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 1e-9
    }

    fn distribution_sample() -> Vec<ObservationRecord> {
        vec![
            record("O. cuniculus", Some("G1"), Source::DailyRecord, 2),
            record("S. scrofa", Some("G1"), Source::DailyRecord, 4),
            record("O. cuniculus", Some("G2"), Source::DailyRecord, 4),
            record("V. vulpes", Some("G3"), Source::DailyRecord, 10),
            record("O. cuniculus", Some("G2"), Source::SequenceRecord, 1),
            record("S. scrofa", Some("G4"), Source::SequenceRecord, 3),
            record("M. meles", None, Source::SequenceRecord, 8),
            record("O. cuniculus", Some("G1"), Source::NoValidation, 7),
        ]
    }

    #[test]
    fn distribution_with_even_rows() {
        let report = distribution(&distribution_sample(), 4);
        let daily = report.source(Source::DailyRecord).unwrap();

        assert_eq!(daily.rows, 4);
        assert_eq!(daily.total_records, 20);
        assert!(close(daily.mean, 5.0));
        assert!(close(daily.std_dev.unwrap(), 12.0_f64.sqrt()));
        assert_eq!((daily.min, daily.max), (2, 10));
        assert!(close(daily.q1, 3.5));
        assert!(close(daily.median, 4.0));
        assert!(close(daily.q3, 5.5));
        assert!((daily.skewness.unwrap() - 1.539_600_7).abs() < 1e-6);

        let bins: Vec<(f64, f64, u64)> = daily
            .histogram
            .iter()
            .map(|bin| (bin.lower, bin.upper, bin.count))
            .collect();
        assert_eq!(
            bins,
            vec![(2.0, 4.0, 1), (4.0, 6.0, 2), (6.0, 8.0, 0), (8.0, 10.0, 1)]
        );
    }

    #[test]
    fn distribution_with_odd_rows() {
        let report = distribution(&distribution_sample(), 4);
        let sequences = report.source(Source::SequenceRecord).unwrap();

        // The unassigned record still belongs to its source.
        assert_eq!(sequences.rows, 3);
        assert!(close(sequences.mean, 4.0));
        assert!(close(sequences.std_dev.unwrap(), 13.0_f64.sqrt()));
        assert!(close(sequences.q1, 2.0));
        assert!(close(sequences.median, 3.0));
        assert!(close(sequences.q3, 5.5));
        assert!((sequences.skewness.unwrap() - 1.152_069_6).abs() < 1e-6);
        let total: u64 = sequences.histogram.iter().map(|bin| bin.count).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn distribution_of_a_single_record() {
        let report = distribution(&distribution_sample(), 4);
        let single = report.source(Source::NoValidation).unwrap();

        assert_eq!(single.rows, 1);
        assert!(close(single.mean, 7.0));
        assert_eq!(single.std_dev, None);
        assert_eq!(single.skewness, None);
        assert!(close(single.q1, 7.0) && close(single.median, 7.0) && close(single.q3, 7.0));
        assert_eq!(
            single.histogram,
            vec![HistogramBin {
                lower: 7.0,
                upper: 7.0,
                count: 1
            }]
        );
    }

    #[test]
    fn distribution_lists_empty_sources() {
        let report = distribution(&distribution_sample(), 4);

        let sources: Vec<Source> = report.by_source.iter().map(|entry| entry.source).collect();
        assert_eq!(sources, Source::all());
        assert_eq!(report.source(Source::GlobalBiodiversity), None);
        assert_eq!(report.bins, 4);
    }

    #[test]
    fn grid_coverage_over_assigned_cells() {
        let coverage = distribution(&distribution_sample(), 4)
            .grid_coverage
            .unwrap();

        // Cell totals: G1 13, G2 5, G3 10, G4 3.
        assert_eq!(coverage.grids, 4);
        assert!(close(coverage.mean_records_per_grid, 7.75));
        assert!(close(coverage.mean_species_per_grid, 1.25));
        assert_eq!(coverage.richest_grid, "G1");
        assert!(close(coverage.q1_records, 4.5));
        assert!(close(coverage.q3_records, 10.75));
        assert_eq!(coverage.high_coverage_grids, 1);
        assert_eq!(coverage.low_coverage_grids, 1);
    }

    #[test]
    fn distribution_of_nothing() {
        let report = distribution(&Vec::<ObservationRecord>::new(), 20);
        assert!(report.by_source.iter().all(|entry| entry.distribution.is_none()));
        assert_eq!(report.grid_coverage, None);

        let unassigned = vec![record("M. meles", None, Source::DailyRecord, 3)];
        let report = distribution(&unassigned, 0);
        assert_eq!(report.grid_coverage, None);
        assert!(report.source(Source::DailyRecord).unwrap().histogram.is_empty());
    }
}
