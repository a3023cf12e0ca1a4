//! CSV ingestion for the tabular inputs.
//!
//! Header names are matched after canonicalization (lowercased, with
//! everything but letters and digits removed) so `Species.Name`,
//! `species_name` and ` SPECIES NAME ` resolve to the same column. A
//! required column that cannot be found fails the whole load.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use wildlife_dash_observation_models::{Silhouette, SpatialPoint};

use crate::NormalizeError;

/// One citizen-science row before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservationRow {
    /// Line number in the source file (header is line 1).
    pub row: u64,
    /// Raw species label.
    pub species_name: Option<String>,
    /// Raw grid cell identifier.
    pub grid_id: Option<String>,
    /// Raw source/platform label.
    pub source_label: Option<String>,
    /// Raw record count cell.
    pub record_count: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObservationColumn {
    Species,
    Grid,
    Source,
    Count,
}

impl ObservationColumn {
    const ALL: &[Self] = &[Self::Species, Self::Grid, Self::Source, Self::Count];

    const fn name(self) -> &'static str {
        match self {
            Self::Species => "species_name",
            Self::Grid => "grid_id",
            Self::Source => "source_label",
            Self::Count => "record_count",
        }
    }

    fn from_header(canonical: &str) -> Option<Self> {
        match canonical {
            "speciesname" | "species" => Some(Self::Species),
            "grid" | "gridid" | "cuadricula" => Some(Self::Grid),
            "datasource" | "sourcelabel" | "source" => Some(Self::Source),
            "records" | "recordcount" | "count" => Some(Self::Count),
            _ => None,
        }
    }
}

/// Lowercases a header and strips everything but letters and digits.
#[must_use]
pub fn canonical_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell(record: &csv::StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn line_of(record: &csv::StringRecord, fallback: usize) -> u64 {
    record
        .position()
        .map_or((fallback + 2) as u64, csv::Position::line)
}

/// Reads the citizen-science table (`species, grid, source, count`).
///
/// # Errors
///
/// Returns [`NormalizeError::MissingColumn`] if any of the four columns is
/// absent, or [`NormalizeError::Csv`] if the file cannot be parsed.
pub fn read_observation_rows<R: Read>(reader: R) -> Result<Vec<RawObservationRow>, NormalizeError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut columns: BTreeMap<usize, ObservationColumn> = BTreeMap::new();
    for (index, header) in csv_reader.headers()?.iter().enumerate() {
        let Some(column) = ObservationColumn::from_header(&canonical_header(header)) else {
            log::debug!("Ignoring citizen-science column '{header}'");
            continue;
        };
        if columns.values().any(|c| *c == column) {
            log::warn!(
                "Column '{header}' duplicates {}; keeping the first one",
                column.name()
            );
            continue;
        }
        columns.insert(index, column);
    }

    for column in ObservationColumn::ALL {
        if !columns.values().any(|c| c == column) {
            return Err(NormalizeError::MissingColumn {
                column: column.name().to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for (i, result) in csv_reader.records().enumerate() {
        let record = result?;
        let mut row = RawObservationRow {
            row: line_of(&record, i),
            ..RawObservationRow::default()
        };
        for (&index, column) in &columns {
            let value = cell(&record, index);
            match column {
                ObservationColumn::Species => row.species_name = value,
                ObservationColumn::Grid => row.grid_id = value,
                ObservationColumn::Source => row.source_label = value,
                ObservationColumn::Count => row.record_count = value,
            }
        }
        rows.push(row);
    }

    log::debug!("Read {} citizen-science rows", rows.len());
    Ok(rows)
}

fn default_delimiter() -> char {
    ';'
}

fn default_latitude_column() -> String {
    "Latitude".to_string()
}

fn default_longitude_column() -> String {
    "Longitude".to_string()
}

/// Layout of the camera-site table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraCsvOptions {
    /// Field delimiter (the camera export uses `;`).
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Column holding the camera identifier. Rows are numbered
    /// `camera-<line>` when unset.
    #[serde(default)]
    pub id_column: Option<String>,
    /// Latitude column name.
    #[serde(default = "default_latitude_column")]
    pub latitude_column: String,
    /// Longitude column name.
    #[serde(default = "default_longitude_column")]
    pub longitude_column: String,
}

impl Default for CameraCsvOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            id_column: None,
            latitude_column: default_latitude_column(),
            longitude_column: default_longitude_column(),
        }
    }
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Result<usize, NormalizeError> {
    let wanted = canonical_header(name);
    headers
        .iter()
        .position(|h| canonical_header(h) == wanted)
        .ok_or_else(|| NormalizeError::MissingColumn {
            column: name.to_string(),
        })
}

/// Parses a coordinate, accepting a decimal comma when no dot is present.
fn parse_coordinate(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let value = if trimmed.contains('.') {
        trimmed.parse::<f64>().ok()?
    } else {
        trimmed.replace(',', ".").parse::<f64>().ok()?
    };
    value.is_finite().then_some(value)
}

/// Reads camera sites as [`SpatialPoint`]s.
///
/// # Errors
///
/// Returns [`NormalizeError::InvalidDelimiter`] for a non-ASCII delimiter,
/// [`NormalizeError::MissingColumn`] if a configured column is absent, and
/// [`NormalizeError::InvalidCoordinate`] for empty or unparseable
/// coordinates. Rows are never skipped.
pub fn read_camera_sites<R: Read>(
    reader: R,
    options: &CameraCsvOptions,
) -> Result<Vec<SpatialPoint>, NormalizeError> {
    let delimiter = u8::try_from(options.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(NormalizeError::InvalidDelimiter {
            delimiter: options.delimiter,
        })?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let lat_index = find_column(&headers, &options.latitude_column)?;
    let lng_index = find_column(&headers, &options.longitude_column)?;
    let id_index = options
        .id_column
        .as_deref()
        .map(|name| find_column(&headers, name))
        .transpose()?;

    let mut sites = Vec::new();
    for (i, result) in csv_reader.records().enumerate() {
        let record = result?;
        let row = line_of(&record, i);

        let coordinate = |index: usize, column: &str| {
            let raw = record.get(index).unwrap_or_default();
            parse_coordinate(raw).ok_or_else(|| NormalizeError::InvalidCoordinate {
                row,
                column: column.to_string(),
                value: raw.to_string(),
            })
        };
        let latitude = coordinate(lat_index, &options.latitude_column)?;
        let longitude = coordinate(lng_index, &options.longitude_column)?;

        let id = id_index
            .and_then(|index| cell(&record, index))
            .unwrap_or_else(|| format!("camera-{row}"));

        sites.push(SpatialPoint::camera_site(id, latitude, longitude));
    }

    log::debug!("Read {} camera sites", sites.len());
    Ok(sites)
}

/// Reads the genus to silhouette lookup.
///
/// Rows missing either value are skipped with a warning; the lookup is
/// purely cosmetic.
///
/// # Errors
///
/// Returns [`NormalizeError::MissingColumn`] when no genus or URL column
/// exists, or [`NormalizeError::Csv`] on parse failure.
pub fn read_silhouettes<R: Read>(reader: R) -> Result<Vec<Silhouette>, NormalizeError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let position = |names: &[&str], column: &str| {
        headers
            .iter()
            .position(|h| names.contains(&canonical_header(h).as_str()))
            .ok_or_else(|| NormalizeError::MissingColumn {
                column: column.to_string(),
            })
    };
    let genus_index = position(&["genus", "genero"], "genus")?;
    let url_index = position(&["url", "silhouette", "silueta", "image"], "url")?;

    let mut silhouettes = Vec::new();
    for (i, result) in csv_reader.records().enumerate() {
        let record = result?;
        match (cell(&record, genus_index), cell(&record, url_index)) {
            (Some(genus), Some(url)) => silhouettes.push(Silhouette { genus, url }),
            _ => log::warn!(
                "Skipping silhouette row {}: missing genus or url",
                line_of(&record, i)
            ),
        }
    }

    Ok(silhouettes)
}
