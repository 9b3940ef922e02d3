//! Note record.

use super::ValidationError;
use serde::{Deserialize, Serialize};

/// Store-assigned note identity.
pub type NoteId = i64;

/// A user-authored text record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// `0` until the store assigns an identity.
    #[serde(default)]
    pub id: NoteId,
    pub title: String,
    pub content: String,
    /// Free text, may be empty.
    #[serde(default)]
    pub category: String,
    /// Epoch milliseconds, set once on insert.
    #[serde(default)]
    pub created_at: i64,
    /// Epoch milliseconds, refreshed on every update.
    #[serde(default)]
    pub updated_at: i64,
}

impl Note {
    /// Creates an unsaved note with empty category.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            content: content.into(),
            category: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Sets the category, builder style.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Returns whether this note has not been assigned a store identity yet.
    pub fn is_new(&self) -> bool {
        self.id <= 0
    }

    /// Checks the save-time invariants: non-blank title and content.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        Ok(())
    }
}
