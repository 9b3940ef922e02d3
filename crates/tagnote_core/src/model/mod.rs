//! Entity model for notes, tags and their association.
//!
//! # Responsibility
//! - Define the plain records persisted by the store.
//! - Own field-level validation shared by every write path.
//!
//! # Invariants
//! - Identity `0` (or any non-positive value) means "not yet persisted".
//! - Timestamps are epoch milliseconds assigned by the store.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod note;
pub mod note_with_tags;
pub mod tag;

/// Field-level validation failure for notes and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Note title is empty or whitespace-only.
    EmptyTitle,
    /// Note content is empty or whitespace-only.
    EmptyContent,
    /// Tag name is empty or whitespace-only.
    EmptyTagName,
    /// Tag color is not `#RRGGBB` or `#AARRGGBB`.
    InvalidColor(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "note title cannot be empty"),
            Self::EmptyContent => write!(f, "note content cannot be empty"),
            Self::EmptyTagName => write!(f, "tag name cannot be empty"),
            Self::InvalidColor(value) => {
                write!(f, "invalid tag color `{value}`; expected #RRGGBB or #AARRGGBB")
            }
        }
    }
}

impl Error for ValidationError {}
