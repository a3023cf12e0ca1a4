//! Descriptive statistics over occurrence points.
//!
//! Points without attributes (camera sites) or without the requested
//! attribute are counted as missing rather than skipped.

use std::collections::BTreeMap;

use wildlife_dash_analytics_models::{
    AccumulationCurves, AttributeCounts, GroupAccumulation, OccurrenceAttribute, RankedCount,
    YearCount, YearlyAccumulation,
};
use wildlife_dash_observation_models::{OccurrenceAttributes, SpatialPoint};

fn attribute_value(attributes: &OccurrenceAttributes, attribute: OccurrenceAttribute) -> Option<&str> {
    match attribute {
        OccurrenceAttribute::Genus => attributes.genus.as_deref(),
        OccurrenceAttribute::Order => attributes.order.as_deref(),
        OccurrenceAttribute::Platform => attributes.platform.as_deref(),
    }
}

fn point_value(point: &SpatialPoint, attribute: OccurrenceAttribute) -> Option<&str> {
    point
        .attributes
        .as_ref()
        .and_then(|attributes| attribute_value(attributes, attribute))
}

fn point_year(point: &SpatialPoint) -> Option<i32> {
    point.attributes.as_ref().and_then(|attributes| attributes.year)
}

fn accumulate(per_year: BTreeMap<i32, u64>) -> Vec<YearCount> {
    let mut cumulative = 0;
    per_year
        .into_iter()
        .map(|(year, records)| {
            cumulative += records;
            YearCount {
                year,
                records,
                cumulative,
            }
        })
        .collect()
}

/// Counts points per value of `attribute`, descending with ascending label
/// tie-break.
#[must_use]
pub fn attribute_counts<'a>(
    points: impl IntoIterator<Item = &'a SpatialPoint>,
    attribute: OccurrenceAttribute,
) -> AttributeCounts {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    let mut missing = 0;

    for point in points {
        match point_value(point, attribute) {
            Some(value) => *counts.entry(value).or_default() += 1,
            None => missing += 1,
        }
    }

    let mut counts: Vec<RankedCount> = counts
        .into_iter()
        .map(|(label, count)| RankedCount {
            label: label.to_string(),
            count,
        })
        .collect();
    // Stable sort keeps the map's ascending label order among ties.
    counts.sort_by(|a, b| b.count.cmp(&a.count));

    AttributeCounts {
        attribute,
        counts,
        missing,
    }
}

/// Points per year with a running total, ascending by year.
#[must_use]
pub fn yearly_accumulation<'a>(
    points: impl IntoIterator<Item = &'a SpatialPoint>,
) -> YearlyAccumulation {
    let mut per_year: BTreeMap<i32, u64> = BTreeMap::new();
    let mut missing_year = 0;

    for point in points {
        match point_year(point) {
            Some(year) => *per_year.entry(year).or_default() += 1,
            None => missing_year += 1,
        }
    }

    YearlyAccumulation {
        years: accumulate(per_year),
        missing_year,
    }
}

/// One accumulation curve per value of `attribute`.
#[must_use]
pub fn accumulation_by_group<'a>(
    points: impl IntoIterator<Item = &'a SpatialPoint>,
    attribute: OccurrenceAttribute,
) -> AccumulationCurves {
    let mut groups: BTreeMap<&str, BTreeMap<i32, u64>> = BTreeMap::new();
    let mut missing = 0;

    for point in points {
        match (point_value(point, attribute), point_year(point)) {
            (Some(group), Some(year)) => {
                *groups.entry(group).or_default().entry(year).or_default() += 1;
            }
            _ => missing += 1,
        }
    }

    AccumulationCurves {
        attribute,
        groups: groups
            .into_iter()
            .map(|(group, per_year)| GroupAccumulation {
                group: group.to_string(),
                years: accumulate(per_year),
            })
            .collect(),
        missing,
    }
}
