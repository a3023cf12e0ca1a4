#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The loaded dashboard dataset.
//!
//! [`Dataset::load`] reads every input once, normalizes the observation
//! table and joins occurrence points and camera sites to the grid. The
//! results sit behind `Arc`s, so cloning a [`Dataset`] hands out the same
//! read-only data. There is no write path after load.
//!
//! A point layer whose grid join fails (for example a CRS mismatch between
//! the camera table and the grid) is held as failed. The records and every
//! view built from them stay available.

pub mod config;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use wildlife_dash_analytics::AnalyticsError;
use wildlife_dash_analytics_models::{Catalog, DashboardViews, ViewRequest};
use wildlife_dash_normalize::{
    NormalizeError, Normalizer, read_camera_sites, read_observation_rows, read_silhouettes,
};
use wildlife_dash_observation_models::{ObservationRecord, Silhouette};
use wildlife_dash_spatial::{
    GridIndex, JoinOutcome, PointSet, SpatialError, parse_grid_polygons, parse_occurrence_points,
};

pub use config::{CONFIG_ENV_VAR, CameraSettings, DatasetConfig, FileSet, GridSettings};
pub use wildlife_dash_normalize::NormalizeReport;

/// Errors raised while loading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// An input or config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path as configured.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config document is malformed.
    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// The observation table failed normalization.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Grid or point geometry failed to load or join.
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

fn open(path: &Path) -> Result<BufReader<File>, DatasetError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| DatasetError::Read {
            path: path.display().to_string(),
            source,
        })
}

fn read_to_string(path: &Path) -> Result<String, DatasetError> {
    std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Point layers joined to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointLayer {
    /// `GeoJSON` occurrence points.
    Occurrences,
    /// Camera-trap sites.
    Cameras,
}

impl PointLayer {
    /// Every layer, in load order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Occurrences, Self::Cameras]
    }
}

/// A point layer whose grid join failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerFailure {
    pub layer: PointLayer,
    /// Rendered [`SpatialError`].
    pub error: String,
}

/// Outcome of joining one point layer to the grid.
pub type LayerJoin = Result<JoinOutcome, SpatialError>;

/// Immutable handle over every loaded input.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Arc<[ObservationRecord]>,
    report: Arc<NormalizeReport>,
    grid: Arc<GridIndex>,
    occurrences: Arc<LayerJoin>,
    cameras: Arc<LayerJoin>,
    silhouettes: Arc<[Silhouette]>,
}

fn join_layer(grid: &GridIndex, layer: PointLayer, points: &PointSet) -> LayerJoin {
    grid.resolve(points).inspect_err(|e| {
        log::error!("Grid join of {layer:?} failed, layer unavailable: {e}");
    })
}

impl Dataset {
    /// Loads, normalizes and joins every input named by `config`.
    ///
    /// Join failures of the occurrence or camera layer (CRS mismatch,
    /// overlapping cells, non-finite coordinates) do not fail the load. The
    /// layer is held as failed: [`Self::layer`] returns the error and
    /// [`Self::failed_layers`] lists it.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] for unreadable files, rows the normalizer
    /// rejects, and a malformed grid layer. Nothing is skipped silently.
    pub fn load(config: &DatasetConfig) -> Result<Self, DatasetError> {
        let files = &config.files;

        let rows = read_observation_rows(open(&config.resolve(&files.citizen_science))?)?;
        let batch = Normalizer::new(&config.normalize).normalize(&rows)?;

        let grid_json = read_to_string(&config.resolve(&files.grid))?;
        let (grid_crs, polygons) = parse_grid_polygons(&grid_json, &config.grid.id_field)?;
        let grid = GridIndex::new(grid_crs, polygons, config.grid.boundary)?;

        let occurrence_json = read_to_string(&config.resolve(&files.occurrences))?;
        let occurrence_points = parse_occurrence_points(&occurrence_json, &config.occurrences)?;
        let occurrences = join_layer(&grid, PointLayer::Occurrences, &occurrence_points);

        let camera_points = PointSet {
            crs: config.cameras.crs.clone(),
            points: read_camera_sites(
                open(&config.resolve(&files.cameras))?,
                &config.cameras.layout,
            )?,
        };
        let cameras = join_layer(&grid, PointLayer::Cameras, &camera_points);

        let silhouettes = match &files.silhouettes {
            Some(path) => read_silhouettes(open(&config.resolve(path))?)?,
            None => Vec::new(),
        };

        Ok(Self::from_parts(
            batch.records,
            batch.report,
            grid,
            occurrences,
            cameras,
            silhouettes,
        ))
    }

    /// Builds a handle from already loaded parts.
    #[must_use]
    pub fn from_parts(
        records: Vec<ObservationRecord>,
        report: NormalizeReport,
        grid: GridIndex,
        occurrences: LayerJoin,
        cameras: LayerJoin,
        silhouettes: Vec<Silhouette>,
    ) -> Self {
        let unknown_grids = records
            .iter()
            .filter_map(|r| r.grid_id.as_deref())
            .filter(|grid_id| !grid.contains_grid(grid_id))
            .count();
        if unknown_grids > 0 && !grid.is_empty() {
            log::warn!("{unknown_grids} observation records reference grid cells missing from the grid layer");
        }

        let describe = |join: &LayerJoin| match join {
            Ok(outcome) => format!(
                "{} ({} unassigned)",
                outcome.points.len(),
                outcome.unassigned
            ),
            Err(_) => "failed".to_string(),
        };
        log::info!(
            "Dataset ready: {} records, occurrences {}, camera sites {}",
            records.len(),
            describe(&occurrences),
            describe(&cameras)
        );

        Self {
            records: records.into(),
            report: Arc::new(report),
            grid: Arc::new(grid),
            occurrences: Arc::new(occurrences),
            cameras: Arc::new(cameras),
            silhouettes: silhouettes.into(),
        }
    }

    /// Canonical observation records.
    #[must_use]
    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    /// What the normalizer flagged or coerced.
    #[must_use]
    pub fn report(&self) -> &NormalizeReport {
        &self.report
    }

    /// The grid index.
    #[must_use]
    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    /// A point layer joined to the grid, or the error its join raised.
    ///
    /// # Errors
    ///
    /// Returns the [`SpatialError`] recorded when the layer's join failed.
    pub fn layer(&self, layer: PointLayer) -> Result<&JoinOutcome, &SpatialError> {
        match layer {
            PointLayer::Occurrences => (*self.occurrences).as_ref(),
            PointLayer::Cameras => (*self.cameras).as_ref(),
        }
    }

    /// Occurrence points joined to the grid.
    ///
    /// # Errors
    ///
    /// Returns the [`SpatialError`] recorded when the join failed.
    pub fn occurrences(&self) -> Result<&JoinOutcome, &SpatialError> {
        self.layer(PointLayer::Occurrences)
    }

    /// Camera sites joined to the grid.
    ///
    /// # Errors
    ///
    /// Returns the [`SpatialError`] recorded when the join failed.
    pub fn cameras(&self) -> Result<&JoinOutcome, &SpatialError> {
        self.layer(PointLayer::Cameras)
    }

    /// Point layers whose join failed.
    #[must_use]
    pub fn failed_layers(&self) -> Vec<LayerFailure> {
        PointLayer::all()
            .iter()
            .filter_map(|&layer| {
                self.layer(layer).err().map(|e| LayerFailure {
                    layer,
                    error: e.to_string(),
                })
            })
            .collect()
    }

    /// Silhouette lookup entries.
    #[must_use]
    pub fn silhouettes(&self) -> &[Silhouette] {
        &self.silhouettes
    }

    /// Silhouette URL for a genus, matched case-insensitively.
    #[must_use]
    pub fn silhouette_for(&self, genus: &str) -> Option<&str> {
        self.silhouettes
            .iter()
            .find(|s| s.genus.eq_ignore_ascii_case(genus.trim()))
            .map(|s| s.url.as_str())
    }

    /// Distinct filter choices over every record.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        wildlife_dash_analytics::catalog(self.records.iter())
    }

    /// One recompute pass over the records.
    ///
    /// # Errors
    ///
    /// Propagates [`AnalyticsError`] from [`wildlife_dash_analytics::recompute`].
    pub fn views(&self, request: &ViewRequest) -> Result<DashboardViews, AnalyticsError> {
        wildlife_dash_analytics::recompute(&self.records, request)
    }
}
