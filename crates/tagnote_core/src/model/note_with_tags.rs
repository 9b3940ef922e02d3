//! Read-only composite of a note and its linked tags.

use super::note::Note;
use super::tag::Tag;
use serde::Serialize;

/// A note paired with its linked tags, ordered by tag name.
///
/// Never persisted directly; assembled by the store in one read transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteWithTags {
    pub note: Note,
    pub tags: Vec<Tag>,
}

impl NoteWithTags {
    /// Tag names in display order.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.name == name)
    }
}
