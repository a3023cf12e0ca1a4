#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial join of observation points onto grid cells.
//!
//! Grid polygons are loaded once into an R-tree. Each point is assigned
//! the `grid_id` of the cell that contains it, or left unassigned when no
//! cell does. Unassigned points stay in the output and are counted.
//!
//! Boundary handling: a point strictly inside one cell gets that cell. A
//! point inside no cell but on the edge of one or more cells (a shared
//! edge in a regular tiling) gets the smallest `grid_id` under
//! [`BoundaryRule::SmallestGridId`], or stays unassigned under
//! [`BoundaryRule::Exclude`]. A point strictly inside two cells means the
//! grid overlaps and fails with [`SpatialError::OverlappingGridCells`].

pub mod crs;
pub mod geojson_input;

use std::collections::{BTreeMap, BTreeSet};

use geo::{Contains, Intersects, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};
use wildlife_dash_observation_models::{JoinedPoint, SpatialPoint};

pub use crs::Crs;
pub use geojson_input::{OccurrenceFields, parse_grid_polygons, parse_occurrence_points};

/// Errors raised while loading geometry or joining points.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// `GeoJSON` parsing or conversion failed.
    #[error("GeoJSON error: {0}")]
    Geojson(#[from] geojson::Error),

    /// Points and polygons declare different coordinate reference systems.
    #[error("CRS mismatch: points are in {points}, grid is in {grid}")]
    CrsMismatch {
        /// CRS of the point set.
        points: Crs,
        /// CRS of the grid.
        grid: Crs,
    },

    /// A point lies strictly inside more than one grid cell.
    #[error("Point {point_id} lies inside overlapping grid cells {grid_ids:?}")]
    OverlappingGridCells {
        /// Identity of the offending point.
        point_id: String,
        /// Every cell containing it, ascending.
        grid_ids: Vec<String>,
    },

    /// Two polygons share a `grid_id`.
    #[error("Duplicate grid id '{grid_id}'")]
    DuplicateGridId {
        /// The repeated identifier.
        grid_id: String,
    },

    /// A feature's geometry is missing or of the wrong type.
    #[error("Feature {feature}: {message}")]
    InvalidGeometry {
        /// Feature identity (id or index).
        feature: String,
        /// What was wrong.
        message: String,
    },

    /// A required feature property is missing.
    #[error("Feature {feature}: missing property '{property}'")]
    MissingProperty {
        /// Feature identity (id or index).
        feature: String,
        /// Property name.
        property: String,
    },

    /// A point has a NaN or infinite coordinate.
    #[error("Point {point_id} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// Identity of the offending point.
        point_id: String,
    },
}

/// How points lying exactly on cell edges are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryRule {
    /// Boundary-inclusive: assign the lexicographically smallest touching
    /// `grid_id`.
    #[default]
    SmallestGridId,
    /// Boundary-exclusive: edge points are unassigned.
    Exclude,
}

/// A grid cell polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPolygon {
    /// Unique cell identifier.
    pub grid_id: String,
    /// Cell boundary.
    pub geometry: MultiPolygon<f64>,
}

/// A set of points sharing one coordinate reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointSet {
    /// CRS every point is expressed in.
    pub crs: Crs,
    /// The points.
    pub points: Vec<SpatialPoint>,
}

/// A grid cell stored in the R-tree.
struct GridEntry {
    grid_id: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for GridEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Non-fatal conditions recorded during a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JoinWarning {
    /// The point is outside every cell and was left unassigned.
    UnassignedSpatialPoint {
        /// Point identity.
        point_id: String,
    },
    /// The point sat on the edge of several cells and one was picked.
    BoundaryTieBreak {
        /// Point identity.
        point_id: String,
        /// Cell the point was assigned to.
        chosen: String,
        /// Every touching cell, ascending.
        candidates: Vec<String>,
    },
}

/// Joined points per grid cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCounts {
    /// Points per assigned cell.
    pub by_grid: BTreeMap<String, u64>,
    /// Points with no cell.
    pub unassigned: u64,
}

/// Result of joining a point set onto the grid.
///
/// Holds exactly one [`JoinedPoint`] per input point, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    /// One entry per input point.
    pub points: Vec<JoinedPoint>,
    /// Points left without a cell.
    pub unassigned: usize,
    /// Edge points resolved by the tie-break rule.
    pub boundary_ties: usize,
    /// Per-point warnings.
    pub warnings: Vec<JoinWarning>,
}

impl JoinOutcome {
    /// Counts joined points per cell for the grid cluster map.
    #[must_use]
    pub fn counts_by_grid(&self) -> GridCounts {
        let mut counts = GridCounts::default();
        for joined in &self.points {
            match &joined.grid_id {
                Some(grid_id) => *counts.by_grid.entry(grid_id.clone()).or_default() += 1,
                None => counts.unassigned += 1,
            }
        }
        counts
    }

    /// Returns the points joined to one cell.
    pub fn by_grid<'a>(&'a self, grid_id: &'a str) -> impl Iterator<Item = &'a JoinedPoint> + 'a {
        self.points
            .iter()
            .filter(move |p| p.grid_id.as_deref() == Some(grid_id))
    }
}

/// Where a single point landed.
enum Placement {
    Inside(String),
    Boundary { chosen: String, candidates: Vec<String> },
    Outside,
}

/// R-tree backed grid used to resolve points to cells.
///
/// Built once and shared read-only across consumers.
pub struct GridIndex {
    crs: Crs,
    cells: RTree<GridEntry>,
    grid_ids: BTreeSet<String>,
    boundary: BoundaryRule,
}

impl std::fmt::Debug for GridIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridIndex")
            .field("crs", &self.crs)
            .field("cells", &self.grid_ids.len())
            .field("boundary", &self.boundary)
            .finish()
    }
}

impl GridIndex {
    /// Builds the index.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::DuplicateGridId`] if two polygons share an
    /// identifier, or [`SpatialError::InvalidGeometry`] for a polygon with
    /// no extent.
    pub fn new(
        crs: Crs,
        polygons: Vec<GridPolygon>,
        boundary: BoundaryRule,
    ) -> Result<Self, SpatialError> {
        let mut grid_ids = BTreeSet::new();
        let mut entries = Vec::with_capacity(polygons.len());

        for polygon in polygons {
            if !grid_ids.insert(polygon.grid_id.clone()) {
                return Err(SpatialError::DuplicateGridId {
                    grid_id: polygon.grid_id,
                });
            }

            let Some(envelope) = compute_envelope(&polygon.geometry) else {
                return Err(SpatialError::InvalidGeometry {
                    feature: polygon.grid_id,
                    message: "polygon has no extent".to_string(),
                });
            };

            entries.push(GridEntry {
                grid_id: polygon.grid_id,
                envelope,
                polygon: polygon.geometry,
            });
        }

        log::info!("Loaded {} grid cells into spatial index ({crs})", entries.len());

        Ok(Self {
            crs,
            cells: RTree::bulk_load(entries),
            grid_ids,
            boundary,
        })
    }

    /// CRS of the grid.
    #[must_use]
    pub const fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grid_ids.len()
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grid_ids.is_empty()
    }

    /// Whether `grid_id` names a cell of this grid.
    #[must_use]
    pub fn contains_grid(&self, grid_id: &str) -> bool {
        self.grid_ids.contains(grid_id)
    }

    /// All cell identifiers, ascending.
    pub fn grid_ids(&self) -> impl Iterator<Item = &str> {
        self.grid_ids.iter().map(String::as_str)
    }

    /// Looks up the cell for a single point.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::OverlappingGridCells`] if the point is
    /// inside more than one cell, or [`SpatialError::NonFiniteCoordinate`]
    /// for NaN/infinite coordinates.
    pub fn locate(&self, point: &SpatialPoint) -> Result<Option<&str>, SpatialError> {
        Ok(match self.place(point)? {
            Placement::Inside(grid_id) | Placement::Boundary { chosen: grid_id, .. } => self
                .grid_ids
                .get(&grid_id)
                .map(String::as_str),
            Placement::Outside => None,
        })
    }

    fn place(&self, point: &SpatialPoint) -> Result<Placement, SpatialError> {
        let (x, y) = (point.longitude, point.latitude);
        if !x.is_finite() || !y.is_finite() {
            return Err(SpatialError::NonFiniteCoordinate {
                point_id: point.id.clone(),
            });
        }

        let geo_point = geo::Point::new(x, y);
        let query_env = AABB::from_point([x, y]);

        let mut inside: Vec<&str> = Vec::new();
        let mut touching: Vec<&str> = Vec::new();

        for entry in self.cells.locate_in_envelope_intersecting(&query_env) {
            if entry.polygon.contains(&geo_point) {
                inside.push(&entry.grid_id);
            } else if entry.polygon.intersects(&geo_point) {
                touching.push(&entry.grid_id);
            }
        }

        inside.sort_unstable();
        touching.sort_unstable();

        match inside.as_slice() {
            [grid_id] => return Ok(Placement::Inside((*grid_id).to_string())),
            [] => {}
            _ => {
                return Err(SpatialError::OverlappingGridCells {
                    point_id: point.id.clone(),
                    grid_ids: inside.iter().map(ToString::to_string).collect(),
                });
            }
        }

        match (self.boundary, touching.first()) {
            (BoundaryRule::SmallestGridId, Some(first)) => Ok(Placement::Boundary {
                chosen: (*first).to_string(),
                candidates: touching.iter().map(ToString::to_string).collect(),
            }),
            _ => Ok(Placement::Outside),
        }
    }

    /// Joins every point of `points` onto the grid.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::CrsMismatch`] when the point set and grid
    /// declare different CRSs (nothing is reprojected), or propagates the
    /// per-point errors of [`Self::locate`].
    pub fn resolve(&self, points: &PointSet) -> Result<JoinOutcome, SpatialError> {
        if points.crs != self.crs {
            return Err(SpatialError::CrsMismatch {
                points: points.crs.clone(),
                grid: self.crs.clone(),
            });
        }

        let mut outcome = JoinOutcome {
            points: Vec::with_capacity(points.points.len()),
            ..JoinOutcome::default()
        };

        for point in &points.points {
            let grid_id = match self.place(point)? {
                Placement::Inside(grid_id) => Some(grid_id),
                Placement::Boundary { chosen, candidates } => {
                    outcome.boundary_ties += 1;
                    log::debug!(
                        "Point {} lies on the edge of {candidates:?}; assigned to {chosen}",
                        point.id
                    );
                    outcome.warnings.push(JoinWarning::BoundaryTieBreak {
                        point_id: point.id.clone(),
                        chosen: chosen.clone(),
                        candidates,
                    });
                    Some(chosen)
                }
                Placement::Outside => {
                    outcome.unassigned += 1;
                    outcome.warnings.push(JoinWarning::UnassignedSpatialPoint {
                        point_id: point.id.clone(),
                    });
                    None
                }
            };

            outcome.points.push(JoinedPoint {
                point: point.clone(),
                grid_id,
            });
        }

        if outcome.unassigned > 0 {
            log::warn!(
                "{} of {} points fall outside every grid cell and are unassigned",
                outcome.unassigned,
                outcome.points.len()
            );
        }
        log::info!(
            "Joined {} points onto {} grid cells ({} on cell edges)",
            outcome.points.len(),
            self.len(),
            outcome.boundary_ties
        );

        Ok(outcome)
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    use geo::BoundingRect;

    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
