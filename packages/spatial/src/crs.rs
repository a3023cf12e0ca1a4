//! Coordinate reference system identifiers.
//!
//! The join never reprojects. Points and polygons must declare the same
//! CRS, compared after normalizing the many spellings GeoJSON exports use
//! (`urn:ogc:def:crs:EPSG::25830`, `epsg:25830`, `EPSG:25830`).

use serde::{Deserialize, Serialize};

const URN_PREFIX: &str = "urn:ogc:def:crs:";

/// A normalized CRS name such as `"EPSG:4326"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Crs(String);

impl Crs {
    /// Normalizes a CRS name.
    ///
    /// OGC URNs are reduced to `AUTHORITY:CODE` (the version segment is
    /// dropped), and `OGC:CRS84` is treated as `EPSG:4326` since points
    /// always carry longitude as x.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let trimmed = name.trim();
        let body = trimmed
            .get(..URN_PREFIX.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(URN_PREFIX))
            .and_then(|_| trimmed.get(URN_PREFIX.len()..))
            .unwrap_or(trimmed);

        let parts: Vec<&str> = body.split(':').filter(|p| !p.is_empty()).collect();
        let normalized = match parts.as_slice() {
            [authority, .., code] => format!(
                "{}:{}",
                authority.to_uppercase(),
                code.to_uppercase()
            ),
            _ => body.to_uppercase(),
        };

        if normalized == "OGC:CRS84" {
            return Self::wgs84();
        }
        Self(normalized)
    }

    /// WGS 84 longitude/latitude, the GeoJSON default.
    #[must_use]
    pub fn wgs84() -> Self {
        Self("EPSG:4326".to_string())
    }

    /// Returns the normalized name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Crs {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.0
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
