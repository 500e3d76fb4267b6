//! Treepath normalization and splitting utilities

use unicode_normalization::UnicodeNormalization;

/// Normalize a node or group name for deterministic comparison
///
/// Normalizes Unicode to NFC so that composed and decomposed spellings of the
/// same name always collide rather than silently coexisting as siblings.
pub fn normalize_name(name: &str) -> String {
    name.nfc().collect()
}

/// Split a slash-delimited treepath into normalized segments
///
/// Empty segments (leading, trailing, or doubled slashes) are discarded, so
/// `"/a//b/"` and `"a/b"` describe the same location.
pub fn split_treepath(treepath: &str) -> Vec<String> {
    treepath
        .split('/')
        .filter(|s| !s.is_empty())
        .map(normalize_name)
        .collect()
}

/// Join segments back into a treepath string
pub fn join_segments(segments: &[String]) -> String {
    segments.join("/")
}
