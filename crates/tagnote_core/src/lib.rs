//! Local persistence core for a tag-aware note-taking app.
//!
//! Layers, leaf to root: entity model, SQLite repositories, the thread-safe
//! `NoteStore` with its change bus, and the async `ViewStateCoordinator`
//! that presentation code talks to.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{bootstrap, ConfigError, CoreConfig, DatabaseLocation};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
pub use model::note::{Note, NoteId};
pub use model::note_with_tags::NoteWithTags;
pub use model::tag::{NoteTagLink, Tag, TagId, DEFAULT_TAG_COLOR};
pub use model::ValidationError;
pub use repo::note_repo::{NoteOrder, NoteRepository, SqliteNoteRepository};
pub use repo::note_with_tags_repo::{NoteWithTagsRepository, SqliteNoteWithTagsRepository};
pub use repo::tag_repo::{SqliteTagRepository, TagOrder, TagRepository};
pub use repo::{EntityKind, RepoError, RepoResult};
pub use service::{CoordinatorError, CoordinatorResult, ViewStateCoordinator};
pub use store::{ChangeBus, NoteStore, StoreChange};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
