//! Tag record and note/tag association.
//!
//! # Invariants
//! - Tag names are unique by exact, case-sensitive match after trimming.
//! - A `(note_id, tag_id)` link exists at most once.

use super::note::NoteId;
use super::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Store-assigned tag identity.
pub type TagId = i64;

/// Color assigned to tags created without an explicit one.
pub const DEFAULT_TAG_COLOR: &str = "#6200EE";

static TAG_COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#(?:[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})$").expect("valid tag color regex")
});

/// A named label attached to any number of notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: TagId,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Tag {
    /// Creates an unsaved tag with the default color.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            color: DEFAULT_TAG_COLOR.to_string(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Checks name and color.
    pub fn validate(&self) -> Result<(), ValidationError> {
        normalize_tag_name(&self.name).ok_or(ValidationError::EmptyTagName)?;
        validate_color(&self.color)
    }
}

/// Association row between one note and one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteTagLink {
    pub note_id: NoteId,
    pub tag_id: TagId,
}

impl NoteTagLink {
    pub fn new(note_id: NoteId, tag_id: TagId) -> Self {
        Self { note_id, tag_id }
    }
}

fn default_color() -> String {
    DEFAULT_TAG_COLOR.to_string()
}

/// Trims one tag name; returns `None` for blank input. Case is preserved.
pub fn normalize_tag_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Normalizes tag names and drops repeats, keeping first-seen order.
///
/// Fails on the first blank name so callers never persist a partial set.
pub fn dedup_tag_names(names: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        let normalized = normalize_tag_name(name).ok_or(ValidationError::EmptyTagName)?;
        if seen.insert(normalized.clone()) {
            unique.push(normalized);
        }
    }
    Ok(unique)
}

/// Checks a color string against `#RRGGBB` / `#AARRGGBB`.
pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    if TAG_COLOR_RE.is_match(color) {
        Ok(())
    } else {
        Err(ValidationError::InvalidColor(color.to_string()))
    }
}
