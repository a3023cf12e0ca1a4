//! Species name canonicalization.
//!
//! Raw species labels arrive as `"O.cuniculus"`, `" o  cuniculus "`,
//! `"Oryctolagus_cuniculus"` and so on. [`canonical_form`] collapses the
//! separator noise into a lookup key, and [`SpeciesCatalog`] then maps
//! configured aliases onto a single canonical label. Names the catalog
//! does not know keep their raw spelling.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use wildlife_dash_observation_models::SpeciesStatus;

/// Runs of whitespace, dots and underscores between name tokens.
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s._]+").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapses separators and normalizes casing of a binomial.
///
/// The genus token is capitalized and the remaining tokens lowercased. A
/// single-letter genus is written in abbreviated form (`"O. cuniculus"`).
/// Returns an empty string when the input has no tokens.
#[must_use]
pub fn canonical_form(raw: &str) -> String {
    let tokens: Vec<&str> = SEPARATOR_RE
        .split(raw.trim())
        .filter(|t| !t.is_empty())
        .collect();

    match tokens.as_slice() {
        [] => String::new(),
        [only] => capitalize(only),
        [genus, rest @ ..] => {
            let mut genus = capitalize(genus);
            if genus.chars().count() == 1 {
                genus.push('.');
            }
            let epithet = rest
                .iter()
                .map(|t| t.to_lowercase())
                .collect::<Vec<_>>()
                .join(" ");
            format!("{genus} {epithet}")
        }
    }
}

fn capitalize(token: &str) -> String {
    let lower = token.to_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Alias table and known species list, keyed by [`canonical_form`].
#[derive(Debug, Clone, Default)]
pub struct SpeciesCatalog {
    aliases: BTreeMap<String, String>,
    known: BTreeSet<String>,
}

impl SpeciesCatalog {
    /// Builds a catalog. Alias keys, alias targets and known names are all
    /// run through [`canonical_form`] so lookups are separator-insensitive.
    #[must_use]
    pub fn new<'a>(
        aliases: impl IntoIterator<Item = (&'a str, &'a str)>,
        known: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let aliases: BTreeMap<String, String> = aliases
            .into_iter()
            .map(|(from, to)| (canonical_form(from), canonical_form(to)))
            .filter(|(from, to)| !from.is_empty() && !to.is_empty())
            .collect();

        let mut known: BTreeSet<String> = known
            .into_iter()
            .map(canonical_form)
            .filter(|s| !s.is_empty())
            .collect();
        known.extend(aliases.values().cloned());

        Self { aliases, known }
    }

    /// Resolves a raw label to its canonical species name.
    ///
    /// Returns `None` for blank input. Names that match neither an alias
    /// nor a known species keep their casing and punctuation, with only
    /// surrounding whitespace trimmed and inner runs collapsed to one
    /// space, and are flagged [`SpeciesStatus::Unmapped`].
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<(String, SpeciesStatus)> {
        let form = canonical_form(raw);
        if form.is_empty() {
            return None;
        }

        if let Some(target) = self.aliases.get(&form) {
            return Some((target.clone(), SpeciesStatus::Canonical));
        }

        if self.known.contains(&form) {
            return Some((form, SpeciesStatus::Canonical));
        }

        let passthrough = WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned();
        Some((passthrough, SpeciesStatus::Unmapped))
    }

    /// Number of canonical species the catalog knows about.
    #[must_use]
    pub fn known_len(&self) -> usize {
        self.known.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separators_and_abbreviates_genus() {
        assert_eq!(canonical_form("O.cuniculus"), "O. cuniculus");
        assert_eq!(canonical_form("  o   cuniculus "), "O. cuniculus");
        assert_eq!(canonical_form("o._Cuniculus"), "O. cuniculus");
        assert_eq!(
            canonical_form("ORYCTOLAGUS_CUNICULUS"),
            "Oryctolagus cuniculus"
        );
        assert_eq!(canonical_form("genetta"), "Genetta");
        assert_eq!(canonical_form(" \t "), "");
    }

    #[test]
    fn alias_maps_to_canonical_label() {
        let catalog = SpeciesCatalog::new(
            [("Oryctolagus cuniculus", "O. cuniculus")],
            ["S. scrofa"],
        );

        assert_eq!(
            catalog.resolve("oryctolagus_cuniculus"),
            Some(("O. cuniculus".to_string(), SpeciesStatus::Canonical))
        );
        assert_eq!(
            catalog.resolve("O.cuniculus"),
            Some(("O. cuniculus".to_string(), SpeciesStatus::Canonical))
        );
        assert_eq!(
            catalog.resolve("s scrofa"),
            Some(("S. scrofa".to_string(), SpeciesStatus::Canonical))
        );
    }

    #[test]
    fn unknown_species_pass_through_flagged() {
        let catalog = SpeciesCatalog::new([], ["S. scrofa"]);
        assert_eq!(
            catalog.resolve("L.granatensis"),
            Some(("L.granatensis".to_string(), SpeciesStatus::Unmapped))
        );
        assert_eq!(catalog.resolve("   "), None);
    }

    #[test]
    fn unmapped_names_keep_casing_and_punctuation() {
        let catalog = SpeciesCatalog::new([("Sus scrofa", "S. scrofa")], ["O. cuniculus"]);

        assert_eq!(
            catalog.resolve("Canis sp."),
            Some(("Canis sp.".to_string(), SpeciesStatus::Unmapped))
        );
        assert_eq!(
            catalog.resolve("  Mustelidae \t indet. "),
            Some(("Mustelidae indet.".to_string(), SpeciesStatus::Unmapped))
        );
        assert_eq!(
            catalog.resolve("iberian LYNX"),
            Some(("iberian LYNX".to_string(), SpeciesStatus::Unmapped))
        );

        // "sp." and "sp" stay distinct.
        assert_ne!(catalog.resolve("Canis sp"), catalog.resolve("Canis sp."));

        // Known names still match through separator noise.
        assert_eq!(
            catalog.resolve("SUS_SCROFA"),
            Some(("S. scrofa".to_string(), SpeciesStatus::Canonical))
        );
    }
}
