//! Paired source comparison.
//!
//! Two aggregate views sharing a grouping are inner-joined on their keys.
//! Pearson r and an OLS line are computed over the pairs, and optionally
//! again after dropping the `k` pairs with the largest combined value.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use wildlife_dash_analytics_models::{
    AggregateKey, AggregateView, CorrelationFit, CorrelationOutcome, CorrelationReport,
    CorrelationRequest, Dimension, GroupBy, LinearFit, OutlierComparison, PairedValue,
    UndefinedReason,
};
use wildlife_dash_observation_models::{ObservationRecord, Source};

use crate::{AnalyticsError, aggregate::aggregate};

/// Inner join of two views on their keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    /// Keys present in both views, ascending by key.
    pub pairs: Vec<PairedValue>,
    /// Keys only in the first view.
    pub only_in_a: usize,
    /// Keys only in the second view.
    pub only_in_b: usize,
}

/// Pairs the rows of two views sharing a grouping.
///
/// # Errors
///
/// Returns [`AnalyticsError::GroupingMismatch`] if the views are grouped
/// along different dimensions.
pub fn pair_views(a: &AggregateView, b: &AggregateView) -> Result<Pairing, AnalyticsError> {
    if a.group_by != b.group_by {
        return Err(AnalyticsError::GroupingMismatch {
            expected: a.group_by.to_string(),
            found: b.group_by.to_string(),
        });
    }

    let values_b: BTreeMap<&AggregateKey, u64> = b
        .rows
        .iter()
        .map(|row| (&row.key, row.total_records))
        .collect();

    let mut pairs: Vec<PairedValue> = a
        .rows
        .iter()
        .filter_map(|row| {
            values_b.get(&row.key).map(|&value_b| PairedValue {
                key: row.key.clone(),
                value_a: row.total_records,
                value_b,
            })
        })
        .collect();
    pairs.sort_by(|x, y| x.key.cmp(&y.key));

    let only_in_a = a.rows.len() - pairs.len();
    let only_in_b = b.rows.len() - pairs.len();
    if only_in_a > 0 || only_in_b > 0 {
        log::debug!(
            "Pairing excluded {only_in_a} keys only in the first view and {only_in_b} only in the second"
        );
    }

    Ok(Pairing {
        pairs,
        only_in_a,
        only_in_b,
    })
}

/// Pearson r and least-squares fit over `pairs`.
///
/// Fewer than two pairs, or a constant value on either axis, produce
/// [`CorrelationOutcome::Undefined`] rather than a number.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn correlate(pairs: &[PairedValue]) -> CorrelationOutcome {
    if pairs.len() < 2 {
        return CorrelationOutcome::Undefined {
            reason: UndefinedReason::InsufficientData { pairs: pairs.len() },
        };
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.value_a as f64).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.value_b as f64).sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0_f64, 0.0_f64, 0.0_f64);
    for pair in pairs {
        let dx = pair.value_a as f64 - mean_a;
        let dy = pair.value_b as f64 - mean_b;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return CorrelationOutcome::Undefined {
            reason: UndefinedReason::ZeroVariance,
        };
    }

    let slope = sxy / sxx;
    CorrelationOutcome::Defined {
        pearson_r: (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0),
        fit: LinearFit {
            slope,
            intercept: slope.mul_add(-mean_a, mean_b),
        },
    }
}

fn fit(pairs: Vec<PairedValue>) -> CorrelationFit {
    let outcome = correlate(&pairs);
    CorrelationFit { pairs, outcome }
}

/// Removes the `k` pairs with the largest `value_a + value_b`, ties broken
/// by ascending key. Returns `(excluded, remaining)`; `remaining` keeps
/// ascending key order.
#[must_use]
pub fn split_outliers(
    pairs: &[PairedValue],
    k: usize,
) -> (Vec<PairedValue>, Vec<PairedValue>) {
    let mut ranked: Vec<&PairedValue> = pairs.iter().collect();
    ranked.sort_by(|x, y| {
        let combined = |p: &PairedValue| Reverse(u128::from(p.value_a) + u128::from(p.value_b));
        combined(x).cmp(&combined(y)).then_with(|| x.key.cmp(&y.key))
    });

    let excluded: Vec<PairedValue> = ranked.iter().take(k).map(|&p| p.clone()).collect();
    let remaining: Vec<PairedValue> = pairs
        .iter()
        .filter(|p| !excluded.iter().any(|e| e.key == p.key))
        .cloned()
        .collect();

    (excluded, remaining)
}

/// Builds the full report for a pairing. `exclude_top == 0` skips the
/// outlier comparison.
#[must_use]
pub fn report(pairing: Pairing, exclude_top: usize) -> CorrelationReport {
    let excluding_outliers = (exclude_top > 0).then(|| {
        let (excluded, remaining) = split_outliers(&pairing.pairs, exclude_top);
        OutlierComparison {
            requested: exclude_top,
            excluded,
            remaining: fit(remaining),
        }
    });

    CorrelationReport {
        all: fit(pairing.pairs),
        only_in_a: pairing.only_in_a,
        only_in_b: pairing.only_in_b,
        excluding_outliers,
    }
}

/// Correlates two views sharing a grouping.
///
/// # Errors
///
/// Returns [`AnalyticsError::GroupingMismatch`] if the views are grouped
/// along different dimensions.
pub fn correlate_views(
    a: &AggregateView,
    b: &AggregateView,
    exclude_top: usize,
) -> Result<CorrelationReport, AnalyticsError> {
    Ok(report(pair_views(a, b)?, exclude_top))
}

/// Correlates per-species totals of two sources.
///
/// # Errors
///
/// Returns [`AnalyticsError::IdenticalSources`] if both sides name the
/// same source.
pub fn correlate_sources<'a>(
    records: impl IntoIterator<Item = &'a ObservationRecord> + Clone,
    request: &CorrelationRequest,
) -> Result<CorrelationReport, AnalyticsError> {
    if request.source_a == request.source_b {
        return Err(AnalyticsError::IdenticalSources {
            selected: request.source_a,
        });
    }

    let by_species = GroupBy::single(Dimension::Species);
    let view_for = |source: Source| {
        aggregate(
            records.clone().into_iter().filter(move |r| r.source == source),
            &by_species,
        )
    };
    let view_a = view_for(request.source_a);
    let view_b = view_for(request.source_b);

    let report = correlate_views(&view_a, &view_b, request.exclude_top)?;
    match report.all.outcome {
        CorrelationOutcome::Defined { pearson_r, .. } => log::debug!(
            "{} vs {}: r = {pearson_r:.4} over {} species",
            request.source_a.label(),
            request.source_b.label(),
            report.all.pairs.len()
        ),
        CorrelationOutcome::Undefined { reason } => log::debug!(
            "{} vs {}: correlation undefined ({reason:?})",
            request.source_a.label(),
            request.source_b.label()
        ),
    }
    Ok(report)
}
