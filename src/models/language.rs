use std::collections::BTreeSet;

use serde::Deserialize;

/// Rendered when no language was detected
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// `language_used` as returned by the model: a list or a single string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DetectedLanguages {
    List(Vec<String>),
    Single(String),
}

impl DetectedLanguages {
    pub fn normalize(&self) -> BTreeSet<String> {
        match self {
            DetectedLanguages::List(list) => normalize_languages(list),
            DetectedLanguages::Single(one) => normalize_languages(&[one]),
        }
    }
}

/// Fold a detected language name into its canonical display form.
///
/// Matching is case-insensitive and ignores surrounding whitespace. Names
/// without a known synonym are kept as given (trimmed).
pub fn canonical_language(name: &str) -> String {
    let trimmed = name.trim();
    let canonical = match trimmed.to_lowercase().as_str() {
        "english" => "English",
        "bahasa" | "bahasa melayu" | "malay" => "Bahasa",
        "hokkien" => "Hokkien",
        "mandarin" | "chinese" | "mandarin chinese" => "Mandarin",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}

/// Canonicalize a list of detected languages into a sorted, de-duplicated set.
///
/// Entries that are themselves comma-joined lists are split first, so an
/// already formatted string normalizes to the same set.
pub fn normalize_languages<S: AsRef<str>>(languages: &[S]) -> BTreeSet<String> {
    languages
        .iter()
        .flat_map(|l| l.as_ref().split(','))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(canonical_language)
        .collect()
}

/// Render a language set for storage, e.g. "Bahasa, English, Mandarin"
pub fn format_languages(languages: &BTreeSet<String>) -> String {
    if languages.is_empty() {
        return UNKNOWN_LANGUAGE.to_string();
    }
    languages.iter().cloned().collect::<Vec<_>>().join(", ")
}
