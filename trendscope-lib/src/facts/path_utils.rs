//! Turning source parameters into safe cache file names.

use xxhash_rust::xxh64::xxh64;

/// Convert an arbitrary string (keyword, language, repository part) into a single path component.
///
/// Lowercases, collapses whitespace to `-`, and replaces traversal sequences and characters
/// that are unsafe in file names with `_`. An empty input becomes `_`.
#[must_use]
pub fn sanitize_path_component(s: &str) -> String {
    let joined = s.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase();
    let safe = joined
        .replace("..", "__")
        .replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'], "_");

    if safe.is_empty() { "_".to_string() } else { safe }
}

/// A path component that is safe on disk and distinct for every distinct input.
///
/// [`sanitize_path_component`] keeps the name readable but folds some inputs together
/// (`a b` and `a-b`, `c/c` and `c:c`), so a hash of the exact input is appended.
#[must_use]
pub fn unique_path_component(s: &str) -> String {
    format!("{}-{:016x}", sanitize_path_component(s), xxh64(s.as_bytes(), 0))
}
