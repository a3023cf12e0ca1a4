//! Source label lookup.
//!
//! Maps raw platform/category strings to exactly one [`Source`] through a
//! fixed table. Keys are compared after lowercasing and collapsing
//! whitespace, dots, underscores and dashes, so `"Daily Record"`,
//! `"DAILY_RECORD"` and `"daily-record"` all hit the same entry.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use wildlife_dash_observation_models::Source;

static LABEL_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s._\-]+").expect("valid regex"));

/// Built-in label table. Configured labels are layered on top.
const DEFAULT_LABELS: &[(&str, Source)] = &[
    ("sequences record", Source::SequenceRecord),
    ("sequence record", Source::SequenceRecord),
    ("sequences", Source::SequenceRecord),
    ("sequence", Source::SequenceRecord),
    ("daily record", Source::DailyRecord),
    ("daily records", Source::DailyRecord),
    ("daily", Source::DailyRecord),
    ("global biodiversity", Source::GlobalBiodiversity),
    ("gbif", Source::GlobalBiodiversity),
    ("no validation", Source::NoValidation),
    ("unvalidated", Source::NoValidation),
    ("not validated", Source::NoValidation),
];

/// Normalizes a label for table lookup.
#[must_use]
pub fn label_key(raw: &str) -> String {
    LABEL_SEPARATOR_RE
        .replace_all(raw.trim(), " ")
        .trim()
        .to_lowercase()
}

/// Fixed raw-label to [`Source`] table.
#[derive(Debug, Clone)]
pub struct SourceLookup {
    table: BTreeMap<String, Source>,
}

impl Default for SourceLookup {
    fn default() -> Self {
        Self::new(std::iter::empty::<(&str, Source)>())
    }
}

impl SourceLookup {
    /// Builds the lookup from the built-in labels plus `extra` entries.
    /// Extra entries override built-in ones with the same key.
    #[must_use]
    pub fn new<'a>(extra: impl IntoIterator<Item = (&'a str, Source)>) -> Self {
        let mut table: BTreeMap<String, Source> = DEFAULT_LABELS
            .iter()
            .map(|(label, source)| (label_key(label), *source))
            .collect();

        for (label, source) in extra {
            let key = label_key(label);
            if !key.is_empty() {
                table.insert(key, source);
            }
        }

        Self { table }
    }

    /// Looks up a raw label. Returns `None` for labels not in the table.
    #[must_use]
    pub fn lookup(&self, raw: &str) -> Option<Source> {
        self.table.get(&label_key(raw)).copied()
    }
}
