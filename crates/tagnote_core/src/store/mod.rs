//! Persistence store: the thread-safe data-access contract.
//!
//! # Responsibility
//! - Own the single SQLite connection and serialize access to it.
//! - Expose every note/tag/link/composite operation behind one facade.
//! - Publish a `StoreChange` on the change bus after each committed write.
//!
//! # Invariants
//! - All calls are serialized by the connection lock, so composite writes
//!   for one note never interleave with another writer.
//! - Failed calls publish nothing.
//! - Log lines carry ids, counts and durations only.

use crate::config::{CoreConfig, DatabaseLocation};
use crate::db::{open_db_in_memory, open_db_with};
use crate::model::note::{Note, NoteId};
use crate::model::note_with_tags::NoteWithTags;
use crate::model::tag::{Tag, TagId};
use crate::repo::note_repo::{NoteOrder, NoteRepository, SqliteNoteRepository};
use crate::repo::note_with_tags_repo::{NoteWithTagsRepository, SqliteNoteWithTagsRepository};
use crate::repo::tag_repo::{SqliteTagRepository, TagOrder, TagRepository};
use crate::repo::{ensure_schema_ready, RepoError, RepoResult};
use log::{debug, error, warn};
use rusqlite::Connection;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

mod bus;

pub use bus::{ChangeBus, StoreChange};

/// Default number of buffered change events per subscriber.
pub const DEFAULT_CHANGE_BUS_CAPACITY: usize = 64;

/// Thread-safe facade over the notes database.
#[derive(Debug)]
pub struct NoteStore {
    conn: Mutex<Connection>,
    bus: ChangeBus,
}

impl NoteStore {
    /// Opens the database described by `config` and applies migrations.
    pub fn open(config: &CoreConfig) -> RepoResult<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let conn = match &config.database {
            DatabaseLocation::Memory => open_db_with(None, busy_timeout)?,
            DatabaseLocation::File { path } => open_db_with(Some(path.as_path()), busy_timeout)?,
        };
        Self::from_connection(conn, config.change_bus_capacity)
    }

    /// Opens a private in-memory database with default settings.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::from_connection(open_db_in_memory()?, DEFAULT_CHANGE_BUS_CAPACITY)
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection, change_bus_capacity: usize) -> RepoResult<Self> {
        ensure_schema_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            bus: ChangeBus::new(change_bus_capacity),
        })
    }

    /// Subscribes to committed-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.bus.subscribe()
    }

    pub fn create_note(&self, note: &Note) -> RepoResult<NoteId> {
        let id = self.with_conn("create_note", |conn| {
            SqliteNoteRepository::new(conn).create_note(note)
        })?;
        self.bus.publish(StoreChange::NOTES);
        Ok(id)
    }

    /// Fails with `NotFound` (and changes nothing) when `note.id` is unknown.
    pub fn update_note(&self, note: &Note) -> RepoResult<()> {
        self.with_conn("update_note", |conn| {
            SqliteNoteRepository::new(conn).update_note(note)
        })?;
        self.bus.publish(StoreChange::NOTES);
        Ok(())
    }

    pub fn delete_note(&self, id: NoteId) -> RepoResult<()> {
        self.with_conn("delete_note", |conn| {
            SqliteNoteRepository::new(conn).delete_note(id)
        })?;
        self.bus
            .publish(StoreChange::NOTES.union(StoreChange::LINKS));
        Ok(())
    }

    pub fn delete_all_notes(&self) -> RepoResult<usize> {
        let removed = self.with_conn("delete_all_notes", |conn| {
            SqliteNoteRepository::new(conn).delete_all_notes()
        })?;
        if removed > 0 {
            self.bus
                .publish(StoreChange::NOTES.union(StoreChange::LINKS));
        }
        Ok(removed)
    }

    pub fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        self.with_conn("get_note", |conn| SqliteNoteRepository::new(conn).get_note(id))
    }

    pub fn list_notes(&self, order: NoteOrder) -> RepoResult<Vec<Note>> {
        self.with_conn("list_notes", |conn| {
            SqliteNoteRepository::new(conn).list_notes(order)
        })
    }

    pub fn search_notes(&self, substring: &str) -> RepoResult<Vec<Note>> {
        self.with_conn("search_notes", |conn| {
            SqliteNoteRepository::new(conn).search_notes(substring)
        })
    }

    pub fn list_notes_by_tag(&self, tag_id: TagId) -> RepoResult<Vec<Note>> {
        self.with_conn("list_notes_by_tag", |conn| {
            SqliteNoteRepository::new(conn).list_notes_by_tag(tag_id)
        })
    }

    pub fn upsert_tag_by_name(&self, name: &str, color: Option<&str>) -> RepoResult<Tag> {
        let tag = self.with_conn("upsert_tag_by_name", |conn| {
            SqliteTagRepository::new(conn).upsert_tag_by_name(name, color)
        })?;
        self.bus.publish(StoreChange::TAGS);
        Ok(tag)
    }

    pub fn update_tag(&self, tag: &Tag) -> RepoResult<()> {
        self.with_conn("update_tag", |conn| {
            SqliteTagRepository::new(conn).update_tag(tag)
        })?;
        self.bus.publish(StoreChange::TAGS);
        Ok(())
    }

    pub fn delete_tag(&self, id: TagId) -> RepoResult<()> {
        self.with_conn("delete_tag", |conn| {
            SqliteTagRepository::new(conn).delete_tag(id)
        })?;
        self.bus.publish(StoreChange::TAGS.union(StoreChange::LINKS));
        Ok(())
    }

    pub fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
        self.with_conn("get_tag", |conn| SqliteTagRepository::new(conn).get_tag(id))
    }

    pub fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
        self.with_conn("find_tag_by_name", |conn| {
            SqliteTagRepository::new(conn).find_tag_by_name(name)
        })
    }

    pub fn list_tags(&self, order: TagOrder) -> RepoResult<Vec<Tag>> {
        self.with_conn("list_tags", |conn| {
            SqliteTagRepository::new(conn).list_tags(order)
        })
    }

    /// Idempotent; returns `false` when the link already existed.
    pub fn link_note_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<bool> {
        let inserted = self.with_conn("link_note_tag", |conn| {
            SqliteTagRepository::new(conn).link_note_tag(note_id, tag_id)
        })?;
        if inserted {
            self.bus.publish(StoreChange::LINKS);
        }
        Ok(inserted)
    }

    pub fn unlink_note_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<bool> {
        let removed = self.with_conn("unlink_note_tag", |conn| {
            SqliteTagRepository::new(conn).unlink_note_tag(note_id, tag_id)
        })?;
        if removed {
            self.bus.publish(StoreChange::LINKS);
        }
        Ok(removed)
    }

    pub fn clear_note_tag_links(&self, note_id: NoteId) -> RepoResult<usize> {
        let removed = self.with_conn("clear_note_tag_links", |conn| {
            SqliteTagRepository::new(conn).clear_note_tag_links(note_id)
        })?;
        if removed > 0 {
            self.bus.publish(StoreChange::LINKS);
        }
        Ok(removed)
    }

    pub fn get_note_with_tags(&self, note_id: NoteId) -> RepoResult<Option<NoteWithTags>> {
        self.with_conn("get_note_with_tags", |conn| {
            SqliteNoteWithTagsRepository::new(conn).get_note_with_tags(note_id)
        })
    }

    pub fn list_notes_with_tags(&self, order: NoteOrder) -> RepoResult<Vec<NoteWithTags>> {
        self.with_conn("list_notes_with_tags", |conn| {
            SqliteNoteWithTagsRepository::new(conn).list_notes_with_tags(order)
        })
    }

    /// Atomic create-or-update of a note plus full replacement of its tags.
    pub fn replace_note_with_tags(&self, note: &Note, tag_names: &[String]) -> RepoResult<NoteId> {
        let note_id = self.with_conn("replace_note_with_tags", |conn| {
            SqliteNoteWithTagsRepository::new(conn).replace_note_with_tags(note, tag_names)
        })?;
        self.bus.publish(StoreChange::ALL);
        Ok(note_id)
    }

    fn with_conn<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Connection) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let mut conn = self.conn.lock().map_err(|_| {
            error!("event=store_op module=store op={op} status=error error_code=lock_poisoned");
            RepoError::LockPoisoned
        })?;
        let result = f(&mut *conn);
        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => debug!("event=store_op module=store op={op} status=ok duration_ms={duration_ms}"),
            Err(err @ (RepoError::NotFound { .. } | RepoError::Validation(_))) => warn!(
                "event=store_op module=store op={op} status=error duration_ms={duration_ms} error_code={}",
                err.code()
            ),
            Err(err) => error!(
                "event=store_op module=store op={op} status=error duration_ms={duration_ms} error_code={} error={}",
                err.code(),
                err
            ),
        }
        result
    }
}
