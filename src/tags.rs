//! Tag-string normalization.
//!
//! Tasks carry a bounded list of lowercase tags. User input arrives as a
//! free-form comma-separated string; normalization trims, lowercases,
//! deduplicates, drops invalid entries, and enforces the configured limit.
//! Dropped entries are non-fatal and reported through a warning callback so
//! the caller can surface them without aborting the operation.

use std::fmt;

/// Non-fatal issue found while normalizing a tag string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagWarning {
    /// The tag appeared more than once; later occurrences are dropped.
    Duplicate(String),
    /// The tag contains characters outside `a-z`, `0-9`, `-`, `_`.
    Invalid(String),
    /// The tag limit was already reached; this tag was dropped.
    LimitReached(String),
}

impl fmt::Display for TagWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagWarning::Duplicate(tag) => write!(f, "duplicate tag dropped: {tag}"),
            TagWarning::Invalid(tag) => write!(f, "invalid tag dropped: {tag}"),
            TagWarning::LimitReached(tag) => write!(f, "tag limit reached, dropped: {tag}"),
        }
    }
}

fn is_valid_tag(tag: &str) -> bool {
    tag.chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
}

/// Normalize a comma-separated tag string into a bounded, deduplicated,
/// lowercase list, preserving first-seen order.
///
/// Empty segments (from stray commas or a blank input) are skipped silently;
/// every other dropped entry fires `warn` exactly once.
pub fn normalize(input: &str, max_tags: usize, mut warn: impl FnMut(TagWarning)) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for raw in input.split(',') {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if !is_valid_tag(&tag) {
            warn(TagWarning::Invalid(tag));
            continue;
        }
        if tags.contains(&tag) {
            warn(TagWarning::Duplicate(tag));
            continue;
        }
        if tags.len() >= max_tags {
            warn(TagWarning::LimitReached(tag));
            continue;
        }
        tags.push(tag);
    }

    tags
}
