//! Dataset configuration.
//!
//! A TOML document describing where the inputs live and how to read them.
//! A default copy is embedded at compile time; a file given on the command
//! line or through `WILDLIFE_DASH_CONFIG` replaces it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wildlife_dash_normalize::{CameraCsvOptions, NormalizerConfig};
use wildlife_dash_spatial::{BoundaryRule, Crs, OccurrenceFields};

use crate::DatasetError;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "WILDLIFE_DASH_CONFIG";

/// Config embedded at compile time.
const DEFAULT_CONFIG: &str = include_str!("../config/dataset.toml");

/// Input file locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    /// Citizen-science observation table (CSV).
    pub citizen_science: PathBuf,
    /// Occurrence points (`GeoJSON`).
    pub occurrences: PathBuf,
    /// Grid cell polygons (`GeoJSON`).
    pub grid: PathBuf,
    /// Camera sites (CSV).
    pub cameras: PathBuf,
    /// Genus to silhouette lookup (CSV).
    #[serde(default)]
    pub silhouettes: Option<PathBuf>,
}

fn default_id_field() -> String {
    "CUADRICULA".to_string()
}

/// Grid polygon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSettings {
    /// Property holding the cell identifier.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Treatment of points lying exactly on a cell boundary.
    #[serde(default)]
    pub boundary: BoundaryRule,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            id_field: default_id_field(),
            boundary: BoundaryRule::default(),
        }
    }
}

fn default_camera_crs() -> Crs {
    Crs::wgs84()
}

/// Camera table settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Column layout.
    #[serde(flatten)]
    pub layout: CameraCsvOptions,
    /// CRS of the latitude/longitude columns.
    #[serde(default = "default_camera_crs")]
    pub crs: Crs,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            layout: CameraCsvOptions::default(),
            crs: default_camera_crs(),
        }
    }
}

/// Full dataset configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Input files.
    pub files: FileSet,
    /// Grid settings.
    #[serde(default)]
    pub grid: GridSettings,
    /// Occurrence attribute property names.
    #[serde(default)]
    pub occurrences: OccurrenceFields,
    /// Camera table settings.
    #[serde(default)]
    pub cameras: CameraSettings,
    /// Normalizer policies and lookup tables.
    #[serde(default)]
    pub normalize: NormalizerConfig,
    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl DatasetConfig {
    /// Parses a TOML document. Relative paths resolve against the working
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Config`] if the document is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, DatasetError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// The embedded default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Config`] if the embedded document is
    /// malformed.
    pub fn embedded() -> Result<Self, DatasetError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Reads a config file. Relative paths resolve against its directory.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Read`] if the file cannot be read and
    /// [`DatasetError::Config`] if it is malformed.
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        log::info!("Loaded dataset config from {}", path.display());
        Ok(config)
    }

    /// Picks the config: an explicit path first, then
    /// [`CONFIG_ENV_VAR`], then the embedded default.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`Self::from_path`] and [`Self::embedded`].
    pub fn locate(explicit: Option<&Path>) -> Result<Self, DatasetError> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_path(Path::new(path.trim())),
            _ => {
                log::debug!("Using embedded dataset config");
                Self::embedded()
            }
        }
    }

    /// Resolves `path` against [`Self::base_dir`].
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}
