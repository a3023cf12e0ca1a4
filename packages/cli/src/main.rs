#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the wildlife dashboard.
//!
//! Loads the dataset once, runs the requested view and prints it as pretty
//! JSON on stdout for a chart or map renderer to consume.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use wildlife_dash_analytics::{
    accumulation_by_group, aggregate, attribute_counts, correlate_sources, distribution, filter,
    yearly_accumulation,
};
use wildlife_dash_analytics_models::{
    AccumulationCurves, AggregateView, AttributeCounts, Catalog, CorrelationRequest,
    DEFAULT_HISTOGRAM_BINS, Dimension, FilterSpec, GroupBy, OccurrenceAttribute, Selection,
    ViewRequest, YearlyAccumulation,
};
use wildlife_dash_dataset::{Dataset, DatasetConfig, LayerFailure, NormalizeReport, PointLayer};
use wildlife_dash_observation_models::{JoinedPoint, Source};
use wildlife_dash_spatial::{GridCounts, JoinOutcome, JoinWarning};

#[derive(Parser)]
#[command(name = "wildlife_dash", about = "Wildlife observation dashboard views")]
struct Cli {
    /// Dataset config file (defaults to `WILDLIFE_DASH_CONFIG`, then the
    /// built-in layout)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Every dashboard view for the given filters
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
        /// Length of the top species/grid lists
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// One aggregate view
    Aggregate {
        #[command(flatten)]
        filters: FilterArgs,
        /// Grouping dimensions, in key order
        #[arg(long, value_delimiter = ',', default_value = "species")]
        by: Vec<Dimension>,
        /// Keep only the first N rows
        #[arg(long)]
        top: Option<usize>,
    },
    /// Per-species correlation between two sources
    Correlate {
        #[command(flatten)]
        filters: FilterArgs,
        /// Source on the x axis
        #[arg(long, default_value = "DAILY_RECORD")]
        source_a: Source,
        /// Source on the y axis
        #[arg(long, default_value = "SEQUENCE_RECORD")]
        source_b: Source,
        /// Number of largest pairs to drop for the comparison
        #[arg(long, default_value_t = 1)]
        exclude_top: usize,
    },
    /// Per-source record count statistics and grid coverage
    Distribution {
        #[command(flatten)]
        filters: FilterArgs,
        /// Histogram bins per source
        #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
        bins: usize,
    },
    /// Grid join summary for a point layer
    Join {
        /// Point layer
        #[arg(long, value_enum, default_value_t = Layer::Occurrences)]
        layer: Layer,
        /// List the points joined to this cell
        #[arg(long)]
        cell: Option<String>,
    },
    /// Occurrence counts and accumulation curves
    Occurrences {
        /// Attribute to split by
        #[arg(long, default_value = "order")]
        by: OccurrenceAttribute,
    },
    /// Filter choices and normalization report
    Catalog,
}

/// Filter flags shared by the record views.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Keep only these species (repeatable)
    #[arg(long = "species")]
    species: Vec<String>,
    /// Keep only these grid cells (repeatable)
    #[arg(long = "grid")]
    grids: Vec<String>,
    /// Keep only these sources (repeatable)
    #[arg(long = "source")]
    sources: Vec<Source>,
    /// Minimum record count of each individual record
    #[arg(long, default_value_t = 0)]
    min_count: u64,
}

impl FilterArgs {
    fn to_spec(&self) -> FilterSpec {
        FilterSpec {
            species: Selection::from_values(self.species.iter().cloned()),
            grids: Selection::from_values(self.grids.iter().cloned()),
            sources: Selection::from_values(self.sources.iter().copied()),
            min_count: self.min_count,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Layer {
    Occurrences,
    Cameras,
}

impl From<Layer> for PointLayer {
    fn from(layer: Layer) -> Self {
        match layer {
            Layer::Occurrences => Self::Occurrences,
            Layer::Cameras => Self::Cameras,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinSummary<'a> {
    crs: String,
    total_points: usize,
    counts: GridCounts,
    boundary_ties: usize,
    warnings: &'a [JoinWarning],
    #[serde(skip_serializing_if = "Option::is_none")]
    cell_points: Option<Vec<&'a JoinedPoint>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OccurrenceSummary {
    counts: AttributeCounts,
    yearly: YearlyAccumulation,
    curves: AccumulationCurves,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogSummary<'a> {
    catalog: Catalog,
    report: &'a NormalizeReport,
    failed_layers: Vec<LayerFailure>,
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn aggregate_view(
    dataset: &Dataset,
    filter_args: &FilterArgs,
    by: Vec<Dimension>,
    top: Option<usize>,
) -> Result<AggregateView, Box<dyn std::error::Error>> {
    let group_by = GroupBy::new(by)?;
    let filtered = filter::apply(&filter_args.to_spec(), dataset.records());
    let mut view = aggregate(filtered.records.iter().copied(), &group_by);
    if let Some(top) = top {
        view.rows.truncate(top);
    }
    Ok(view)
}

fn joined_layer(dataset: &Dataset, layer: PointLayer) -> Result<&JoinOutcome, String> {
    dataset
        .layer(layer)
        .map_err(|e| format!("{layer:?} layer unavailable: {e}"))
}

fn join_summary<'a>(
    dataset: &'a Dataset,
    outcome: &'a JoinOutcome,
    cell: Option<&'a str>,
) -> JoinSummary<'a> {
    JoinSummary {
        crs: dataset.grid().crs().to_string(),
        total_points: outcome.points.len(),
        counts: outcome.counts_by_grid(),
        boundary_ties: outcome.boundary_ties,
        warnings: &outcome.warnings,
        cell_points: cell.map(|cell| outcome.by_grid(cell).collect()),
    }
}

fn occurrence_summary(
    dataset: &Dataset,
    by: OccurrenceAttribute,
) -> Result<OccurrenceSummary, Box<dyn std::error::Error>> {
    let outcome = joined_layer(dataset, PointLayer::Occurrences)?;
    let points = || outcome.points.iter().map(|joined| &joined.point);
    Ok(OccurrenceSummary {
        counts: attribute_counts(points(), by),
        yearly: yearly_accumulation(points()),
        curves: accumulation_by_group(points(), by),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = DatasetConfig::locate(cli.config.as_deref())?;
    let dataset = Dataset::load(&config)?;

    match cli.command {
        Commands::Summary { filters, top } => {
            let request = ViewRequest {
                filter: filters.to_spec(),
                top_n: top,
                correlation: Some(CorrelationRequest::default()),
            };
            print_json(&dataset.views(&request)?)?;
        }
        Commands::Aggregate { filters, by, top } => {
            print_json(&aggregate_view(&dataset, &filters, by, top)?)?;
        }
        Commands::Correlate {
            filters,
            source_a,
            source_b,
            exclude_top,
        } => {
            let request = CorrelationRequest {
                source_a,
                source_b,
                exclude_top,
            };
            let filtered = filter::apply(&filters.to_spec(), dataset.records());
            print_json(&correlate_sources(filtered.records.iter().copied(), &request)?)?;
        }
        Commands::Distribution { filters, bins } => {
            let filtered = filter::apply(&filters.to_spec(), dataset.records());
            print_json(&distribution(filtered.records.iter().copied(), bins))?;
        }
        Commands::Join { layer, cell } => {
            let outcome = joined_layer(&dataset, layer.into())?;
            print_json(&join_summary(&dataset, outcome, cell.as_deref()))?;
        }
        Commands::Occurrences { by } => {
            print_json(&occurrence_summary(&dataset, by)?)?;
        }
        Commands::Catalog => {
            print_json(&CatalogSummary {
                catalog: dataset.catalog(),
                report: dataset.report(),
                failed_layers: dataset.failed_layers(),
            })?;
        }
    }

    Ok(())
}
