//! Composite note-with-tags reads and the atomic save-with-tags write.
//!
//! # Responsibility
//! - Assemble `NoteWithTags` from two queries inside one read transaction.
//! - Own `replace_note_with_tags`, the all-or-nothing save path.
//!
//! # Invariants
//! - A composite read never observes a note whose link set is mid-update.
//! - `replace_note_with_tags` either applies note row, link clear, tag
//!   upserts and links together, or leaves storage untouched.

use super::note_repo::{fetch_note, insert_note, list_notes_ordered, update_note_row, NoteOrder};
use super::tag_repo::{clear_links, link, load_tags_for_note, upsert_tag};
use super::RepoResult;
use crate::model::note::{Note, NoteId};
use crate::model::note_with_tags::NoteWithTags;
use crate::model::tag::dedup_tag_names;
use rusqlite::{Connection, TransactionBehavior};

/// Repository interface for composite note + tags use-cases.
pub trait NoteWithTagsRepository {
    fn get_note_with_tags(&mut self, note_id: NoteId) -> RepoResult<Option<NoteWithTags>>;
    fn list_notes_with_tags(&mut self, order: NoteOrder) -> RepoResult<Vec<NoteWithTags>>;
    /// Creates (`note.id` unset) or updates the note, then replaces its whole
    /// tag set with `tag_names`, resolving each name to an existing or new
    /// tag. Returns the note identity.
    fn replace_note_with_tags(&mut self, note: &Note, tag_names: &[String])
        -> RepoResult<NoteId>;
}

/// SQLite-backed composite repository.
pub struct SqliteNoteWithTagsRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNoteWithTagsRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        super::ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NoteWithTagsRepository for SqliteNoteWithTagsRepository<'_> {
    fn get_note_with_tags(&mut self, note_id: NoteId) -> RepoResult<Option<NoteWithTags>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?;
        let composite = match fetch_note(&tx, note_id)? {
            Some(note) => {
                let tags = load_tags_for_note(&tx, note.id)?;
                Some(NoteWithTags { note, tags })
            }
            None => None,
        };
        tx.commit()?;
        Ok(composite)
    }

    fn list_notes_with_tags(&mut self, order: NoteOrder) -> RepoResult<Vec<NoteWithTags>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?;
        let notes = list_notes_ordered(&tx, order)?;
        let mut composites = Vec::with_capacity(notes.len());
        for note in notes {
            let tags = load_tags_for_note(&tx, note.id)?;
            composites.push(NoteWithTags { note, tags });
        }
        tx.commit()?;
        Ok(composites)
    }

    fn replace_note_with_tags(
        &mut self,
        note: &Note,
        tag_names: &[String],
    ) -> RepoResult<NoteId> {
        note.validate()?;
        let names = dedup_tag_names(tag_names)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let note_id = if note.is_new() {
            insert_note(&tx, note)?
        } else {
            update_note_row(&tx, note)?;
            clear_links(&tx, note.id)?;
            note.id
        };

        for name in &names {
            let tag = upsert_tag(&tx, name, None)?;
            link(&tx, note_id, tag.id)?;
        }

        tx.commit()?;
        Ok(note_id)
    }
}
