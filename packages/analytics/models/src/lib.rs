#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result and request types for the dashboard analytics.
//!
//! Aggregate views, filter predicates, correlation reports and summary
//! statistics are plain serializable values. The rendering layer consumes
//! them directly; nothing here holds a reference back into the base
//! dataset.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use wildlife_dash_observation_models::{Source, UNASSIGNED_GRID_LABEL};

// ── Grouping ──────────────────────────────────────────────────────────────

/// A dimension records can be grouped along.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Dimension {
    /// Canonical species name.
    Species,
    /// Grid cell.
    Grid,
    /// Observation source.
    Source,
}

impl Dimension {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Species, Self::Grid, Self::Source]
    }
}

/// Error returned when a grouping is empty or repeats a dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidGroupingError {
    /// The rejected dimensions.
    pub dimensions: Vec<Dimension>,
}

impl std::fmt::Display for InvalidGroupingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid grouping {:?}: expected one or more distinct dimensions",
            self.dimensions
        )
    }
}

impl std::error::Error for InvalidGroupingError {}

/// An ordered, non-empty list of distinct grouping dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Dimension>", into = "Vec<Dimension>")]
pub struct GroupBy(Vec<Dimension>);

impl GroupBy {
    /// Validates a grouping.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidGroupingError`] if `dimensions` is empty or lists a
    /// dimension twice.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, InvalidGroupingError> {
        let distinct: BTreeSet<Dimension> = dimensions.iter().copied().collect();
        if dimensions.is_empty() || distinct.len() != dimensions.len() {
            return Err(InvalidGroupingError { dimensions });
        }
        Ok(Self(dimensions))
    }

    /// Groups by a single dimension.
    #[must_use]
    pub fn single(dimension: Dimension) -> Self {
        Self(vec![dimension])
    }

    /// The dimensions, in key order.
    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.0
    }

    /// Whether `dimension` is part of the grouping key.
    #[must_use]
    pub fn fixes(&self, dimension: Dimension) -> bool {
        self.0.contains(&dimension)
    }
}

impl TryFrom<Vec<Dimension>> for GroupBy {
    type Error = InvalidGroupingError;

    fn try_from(value: Vec<Dimension>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupBy> for Vec<Dimension> {
    fn from(value: GroupBy) -> Self {
        value.0
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.0.iter().map(AsRef::as_ref).collect();
        f.write_str(&names.join(","))
    }
}

/// One component of an aggregate key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "dimension", content = "value", rename_all = "snake_case")]
pub enum KeyPart {
    /// A species name.
    Species(String),
    /// A grid cell; `None` is the unassigned group.
    Grid(Option<String>),
    /// A source.
    Source(Source),
}

impl KeyPart {
    /// Text used for display and for the ascending tie-break.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Species(name) => name,
            Self::Grid(Some(grid_id)) => grid_id,
            Self::Grid(None) => UNASSIGNED_GRID_LABEL,
            Self::Source(source) => source.as_ref(),
        }
    }

    /// Breaks label ties so ordering agrees with equality. Keeps the
    /// unassigned grid group apart from a real cell sharing its label.
    const fn rank(&self) -> u8 {
        match self {
            Self::Species(_) => 0,
            Self::Grid(Some(_)) => 1,
            Self::Grid(None) => 2,
            Self::Source(_) => 3,
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.label()
            .cmp(other.label())
            .then_with(|| self.rank().cmp(&other.rank()))
    }
}

/// A full grouping key: one [`KeyPart`] per grouped dimension.
///
/// Ordered lexicographically by part labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateKey(pub Vec<KeyPart>);

impl std::fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.0.iter().map(KeyPart::label).collect();
        f.write_str(&labels.join(" / "))
    }
}

// ── Aggregate views ───────────────────────────────────────────────────────

/// Summary statistics for one group.
///
/// Distinct counts are `None` for dimensions fixed by the grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow {
    /// Group key.
    pub key: AggregateKey,
    /// Sum of `record_count` over the group.
    pub total_records: u64,
    /// Number of observation records merged into the group.
    pub record_rows: u64,
    /// Distinct species in the group.
    pub distinct_species: Option<u64>,
    /// Distinct assigned grid cells in the group.
    pub distinct_grids: Option<u64>,
    /// Distinct sources in the group.
    pub distinct_sources: Option<u64>,
}

/// Grouped summary of a filtered record set.
///
/// Rows are sorted by descending `total_records`, ties broken by ascending
/// key. The sum of row totals always equals `total_records`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateView {
    /// Grouping used.
    pub group_by: GroupBy,
    /// One row per distinct key.
    pub rows: Vec<AggregateRow>,
    /// Sum of `record_count` over the whole filtered set.
    pub total_records: u64,
}

impl AggregateView {
    /// An empty view for `group_by`.
    #[must_use]
    pub const fn empty(group_by: GroupBy) -> Self {
        Self {
            group_by,
            rows: Vec::new(),
            total_records: 0,
        }
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first `n` rows (all rows when fewer).
    #[must_use]
    pub fn top(&self, n: usize) -> &[AggregateRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Looks up a group by key.
    #[must_use]
    pub fn get(&self, key: &AggregateKey) -> Option<&AggregateRow> {
        self.rows.iter().find(|row| &row.key == key)
    }

    /// Share of the view total held by `row`, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_of_total(&self, row: &AggregateRow) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        row.total_records as f64 * 100.0 / self.total_records as f64
    }
}

// ── Filtering ─────────────────────────────────────────────────────────────

/// Set-membership clause of a filter.
///
/// [`Selection::All`] is the explicit "no filtering" sentinel. An empty
/// set is never "exclude everything": [`Selection::from_values`] maps it to
/// `All`, and [`Selection::matches`] treats an empty `Only` the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection<T: Ord> {
    /// No filtering on this dimension.
    #[default]
    All,
    /// Keep only these values.
    Only(BTreeSet<T>),
}

impl<T: Ord> Selection<T> {
    /// Builds a selection; no values means [`Selection::All`].
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        let set: BTreeSet<T> = values.into_iter().collect();
        if set.is_empty() { Self::All } else { Self::Only(set) }
    }

    /// Whether this clause filters nothing.
    #[must_use]
    pub fn is_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.is_empty(),
        }
    }

    /// Whether `value` passes this clause.
    #[must_use]
    pub fn matches<Q>(&self, value: &Q) -> bool
    where
        T: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self {
            Self::All => true,
            Self::Only(set) => set.is_empty() || set.contains(value),
        }
    }
}

/// Conjunctive filter over observation records.
///
/// `min_count` applies to each record's own `record_count` before any
/// aggregation. A grid total shown after filtering is therefore the sum of
/// the records that individually pass the threshold, not a threshold on
/// the grid total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    /// Species clause.
    #[serde(default)]
    pub species: Selection<String>,
    /// Grid clause. A record without a grid never matches an `Only` set.
    #[serde(default)]
    pub grids: Selection<String>,
    /// Source clause.
    #[serde(default)]
    pub sources: Selection<Source>,
    /// Minimum per-record count (inclusive).
    #[serde(default)]
    pub min_count: u64,
}

// ── Correlation ───────────────────────────────────────────────────────────

const fn default_exclude_top() -> usize {
    1
}

/// Which two sources to correlate per species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationRequest {
    /// Source providing `value_a`.
    pub source_a: Source,
    /// Source providing `value_b`.
    pub source_b: Source,
    /// Number of largest pairs to drop for the outlier comparison.
    #[serde(default = "default_exclude_top")]
    pub exclude_top: usize,
}

impl Default for CorrelationRequest {
    fn default() -> Self {
        Self {
            source_a: Source::DailyRecord,
            source_b: Source::SequenceRecord,
            exclude_top: default_exclude_top(),
        }
    }
}

/// One key present in both correlated views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedValue {
    /// Shared key.
    pub key: AggregateKey,
    /// Total from the first view.
    pub value_a: u64,
    /// Total from the second view.
    pub value_b: u64,
}

/// Ordinary least-squares line `b = slope * a + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearFit {
    /// Slope.
    pub slope: f64,
    /// Intercept.
    pub intercept: f64,
}

/// Why a correlation could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UndefinedReason {
    /// Fewer than two paired points.
    InsufficientData {
        /// Pairs available.
        pairs: usize,
    },
    /// All values on one axis are equal.
    ZeroVariance,
}

/// Correlation coefficient and trend line, or an explicit undefined marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CorrelationOutcome {
    /// Pearson r and the fitted line.
    #[serde(rename_all = "camelCase")]
    Defined {
        /// Pearson correlation coefficient.
        pearson_r: f64,
        /// Least-squares fit.
        fit: LinearFit,
    },
    /// No coefficient can be reported.
    Undefined {
        /// Why.
        reason: UndefinedReason,
    },
}

impl CorrelationOutcome {
    /// The coefficient, when defined.
    #[must_use]
    pub const fn pearson_r(&self) -> Option<f64> {
        match self {
            Self::Defined { pearson_r, .. } => Some(*pearson_r),
            Self::Undefined { .. } => None,
        }
    }
}

/// Pairs and the statistics computed over them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationFit {
    /// Pairs used, ascending by key.
    pub pairs: Vec<PairedValue>,
    /// Result over `pairs`.
    pub outcome: CorrelationOutcome,
}

/// The same statistics after dropping the largest pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierComparison {
    /// Number of pairs requested for removal.
    pub requested: usize,
    /// Pairs removed, largest `value_a + value_b` first.
    pub excluded: Vec<PairedValue>,
    /// Statistics over the remaining pairs.
    pub remaining: CorrelationFit,
}

/// Full correlation output: unfiltered statistics alongside the outlier
/// comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationReport {
    /// Statistics over every paired key.
    pub all: CorrelationFit,
    /// Keys only present in the first view (excluded from pairing).
    pub only_in_a: usize,
    /// Keys only present in the second view (excluded from pairing).
    pub only_in_b: usize,
    /// Present when outlier exclusion was requested.
    pub excluding_outliers: Option<OutlierComparison>,
}

// ── Summaries ─────────────────────────────────────────────────────────────

/// A label and its summed records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCount {
    /// Group label.
    pub label: String,
    /// Count.
    pub count: u64,
}

/// Headline numbers for a filtered record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    /// Sum of `record_count`.
    pub total_records: u64,
    /// Distinct species.
    pub unique_species: u64,
    /// Distinct assigned grid cells.
    pub unique_grids: u64,
    /// Distinct sources.
    pub unique_sources: u64,
    /// Distinct species per source.
    pub species_richness_by_source: BTreeMap<Source, u64>,
    /// Species with the most records.
    pub top_species: Vec<RankedCount>,
    /// Grid cells with the most records.
    pub top_grids: Vec<RankedCount>,
}

/// Distinct values present in a record set, for filter choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Species names, ascending.
    pub species: Vec<String>,
    /// Assigned grid ids, ascending.
    pub grids: Vec<String>,
    /// Sources, in enum order.
    pub sources: Vec<Source>,
}

/// One source's portion of the filtered total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceShare {
    /// Source.
    pub source: Source,
    /// Summed records.
    pub total_records: u64,
    /// Percentage of the filtered total.
    pub percent: f64,
}

// ── Distributions ─────────────────────────────────────────────────────────

/// Histogram bins used when a request does not say.
pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

/// One equal-width histogram bin. `upper` is exclusive except on the last
/// bin, which closes at the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// Descriptive statistics of per-record `record_count` values.
///
/// Quartiles interpolate linearly between the two nearest ranks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountDistribution {
    /// Records in the group.
    pub rows: u64,
    /// Sum of their counts.
    pub total_records: u64,
    pub mean: f64,
    /// Sample standard deviation. `None` below two rows.
    pub std_dev: Option<f64>,
    pub min: u64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: u64,
    /// Adjusted Fisher-Pearson skewness. `None` below three rows, zero when
    /// every count is equal.
    pub skewness: Option<f64>,
    pub histogram: Vec<HistogramBin>,
}

/// Count distribution of one source. `None` when the source has no records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDistribution {
    pub source: Source,
    pub distribution: Option<CountDistribution>,
}

/// How evenly records cover the assigned grid cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCoverage {
    /// Assigned cells with at least one record.
    pub grids: u64,
    pub mean_species_per_grid: f64,
    pub mean_records_per_grid: f64,
    /// Cell with the most records, ties broken by ascending id.
    pub richest_grid: String,
    /// First quartile of per-cell totals.
    pub q1_records: f64,
    /// Third quartile of per-cell totals.
    pub q3_records: f64,
    /// Cells whose total is above `q3_records`.
    pub high_coverage_grids: u64,
    /// Cells whose total is below `q1_records`.
    pub low_coverage_grids: u64,
}

/// Per-source count distributions plus grid coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
    /// Histogram bins per source.
    pub bins: usize,
    /// One entry per source, in enum order.
    pub by_source: Vec<SourceDistribution>,
    /// `None` when no record is assigned to a grid cell.
    pub grid_coverage: Option<GridCoverage>,
}

impl DistributionReport {
    /// Distribution of one source, if it has records.
    #[must_use]
    pub fn source(&self, source: Source) -> Option<&CountDistribution> {
        self.by_source
            .iter()
            .find(|entry| entry.source == source)
            .and_then(|entry| entry.distribution.as_ref())
    }
}

// ── Occurrence statistics ─────────────────────────────────────────────────

/// Descriptive attribute of occurrence points.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OccurrenceAttribute {
    /// Genus.
    Genus,
    /// Taxonomic order.
    Order,
    /// Publishing platform.
    Platform,
}

/// Occurrence points per attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeCounts {
    /// Attribute counted.
    pub attribute: OccurrenceAttribute,
    /// Counts, descending with ascending label tie-break.
    pub counts: Vec<RankedCount>,
    /// Points without the attribute.
    pub missing: u64,
}

/// Records in one year with the running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearCount {
    /// Year.
    pub year: i32,
    /// Points observed that year.
    pub records: u64,
    /// Points observed up to and including that year.
    pub cumulative: u64,
}

/// Per-year occurrence counts with cumulative totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyAccumulation {
    /// Ascending by year.
    pub years: Vec<YearCount>,
    /// Points without a year.
    pub missing_year: u64,
}

/// Accumulation curve of one attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAccumulation {
    /// Attribute value (e.g. a taxonomic order).
    pub group: String,
    /// Ascending by year.
    pub years: Vec<YearCount>,
}

/// Accumulation curves for every value of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationCurves {
    /// Attribute the curves are split by.
    pub attribute: OccurrenceAttribute,
    /// One curve per value, ascending by value.
    pub groups: Vec<GroupAccumulation>,
    /// Points lacking the attribute or a year.
    pub missing: u64,
}

// ── Recompute pass ────────────────────────────────────────────────────────

const fn default_top_n() -> usize {
    10
}

/// Everything the dashboard needs to redraw after a filter change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRequest {
    /// Active filter.
    #[serde(default)]
    pub filter: FilterSpec,
    /// Length of the top-N lists in the summary.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Correlation to compute, if any.
    #[serde(default)]
    pub correlation: Option<CorrelationRequest>,
}

impl Default for ViewRequest {
    fn default() -> Self {
        Self {
            filter: FilterSpec::default(),
            top_n: default_top_n(),
            correlation: Some(CorrelationRequest::default()),
        }
    }
}

/// A complete, consistent snapshot produced by one recompute pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardViews {
    /// Records that passed the filter.
    pub filtered_records: usize,
    /// Records the filter excluded.
    pub excluded_records: usize,
    /// Grouped by species.
    pub by_species: AggregateView,
    /// Grouped by grid cell.
    pub by_grid: AggregateView,
    /// Grouped by source.
    pub by_source: AggregateView,
    /// Per-source share of the total.
    pub source_shares: Vec<SourceShare>,
    /// Headline numbers.
    pub summary: SummaryStats,
    /// Present when the request asked for a correlation.
    pub correlation: Option<CorrelationReport>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn grouping_rejects_empty_and_duplicates() {
        assert!(GroupBy::new(vec![]).is_err());
        assert!(GroupBy::new(vec![Dimension::Grid, Dimension::Grid]).is_err());
        let group_by = GroupBy::new(vec![Dimension::Species, Dimension::Grid]).unwrap();
        assert!(group_by.fixes(Dimension::Grid));
        assert!(!group_by.fixes(Dimension::Source));
        assert_eq!(group_by.to_string(), "species,grid");
    }

    #[test]
    fn dimension_parses_case_insensitively() {
        assert_eq!(Dimension::from_str("Species").unwrap(), Dimension::Species);
        assert_eq!(Dimension::from_str("grid").unwrap(), Dimension::Grid);
        assert!(Dimension::from_str("year").is_err());
    }

    #[test]
    fn empty_selection_means_all() {
        let selection: Selection<String> = Selection::from_values(Vec::new());
        assert_eq!(selection, Selection::All);
        assert!(selection.matches("anything"));

        let only_empty: Selection<String> = Selection::Only(BTreeSet::new());
        assert!(only_empty.is_all());
        assert!(only_empty.matches("anything"));

        let some = Selection::from_values(["X".to_string()]);
        assert!(some.matches("X"));
        assert!(!some.matches("Y"));
    }

    #[test]
    fn unassigned_grid_key_differs_from_lookalike_cell() {
        let unassigned = KeyPart::Grid(None);
        let lookalike = KeyPart::Grid(Some(UNASSIGNED_GRID_LABEL.to_string()));
        assert_ne!(unassigned, lookalike);
        assert_ne!(unassigned.cmp(&lookalike), std::cmp::Ordering::Equal);
    }

    #[test]
    fn keys_order_by_label() {
        let a = AggregateKey(vec![KeyPart::Species("A. a".to_string())]);
        let b = AggregateKey(vec![KeyPart::Species("B. b".to_string())]);
        assert!(a < b);
        assert_eq!(a.to_string(), "A. a");
    }

    #[test]
    fn top_clamps_to_length() {
        let view = AggregateView::empty(GroupBy::single(Dimension::Species));
        assert!(view.top(5).is_empty());
        assert!(view.is_empty());
    }
}
