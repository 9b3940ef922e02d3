//! Tag and note/tag link repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Resolve tags by exact name with create-if-missing semantics.
//! - Maintain `note_tag_cross_ref` rows idempotently.
//!
//! # Invariants
//! - At most one tag row per (trimmed, case-sensitive) name.
//! - Linking an existing pair is a no-op, never an error.
//! - Deleting a tag removes its links in the same transaction.

use super::{RepoError, RepoResult};
use crate::model::note::NoteId;
use crate::model::tag::{normalize_tag_name, validate_color, Tag, TagId, DEFAULT_TAG_COLOR};
use crate::model::ValidationError;
use rusqlite::{params, Connection, Row, TransactionBehavior};

const TAG_SELECT_SQL: &str = "SELECT tags.id, tags.name, tags.color FROM tags";

/// Sort order for tag listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagOrder {
    /// Byte-wise ascending by name.
    #[default]
    NameAsc,
    IdAsc,
}

impl TagOrder {
    fn order_by_sql(self) -> &'static str {
        match self {
            Self::NameAsc => "tags.name ASC, tags.id ASC",
            Self::IdAsc => "tags.id ASC",
        }
    }
}

/// Repository interface for tags and note/tag links.
pub trait TagRepository {
    /// Returns the tag named `name`, creating it with `color` (or the default
    /// color) when absent. An existing tag keeps its stored color.
    fn upsert_tag_by_name(&self, name: &str, color: Option<&str>) -> RepoResult<Tag>;
    /// Renames/recolors an existing tag.
    fn update_tag(&self, tag: &Tag) -> RepoResult<()>;
    /// Removes a tag together with its links.
    fn delete_tag(&mut self, id: TagId) -> RepoResult<()>;
    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>>;
    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>>;
    fn list_tags(&self, order: TagOrder) -> RepoResult<Vec<Tag>>;
    /// Links a note and a tag. Returns `false` when the pair already existed.
    fn link_note_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<bool>;
    /// Unlinks a note and a tag. Returns `false` when no such link existed.
    fn unlink_note_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<bool>;
    /// Removes every link of one note; returns the number removed.
    fn clear_note_tag_links(&self, note_id: NoteId) -> RepoResult<usize>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        super::ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn upsert_tag_by_name(&self, name: &str, color: Option<&str>) -> RepoResult<Tag> {
        upsert_tag(self.conn, name, color)
    }

    fn update_tag(&self, tag: &Tag) -> RepoResult<()> {
        tag.validate()?;
        let name = normalize_tag_name(&tag.name).ok_or(ValidationError::EmptyTagName)?;
        let changed = self.conn.execute(
            "UPDATE tags SET name = ?2, color = ?3 WHERE id = ?1;",
            params![tag.id, name, tag.color],
        )?;
        if changed == 0 {
            return Err(RepoError::tag_not_found(tag.id));
        }
        Ok(())
    }

    fn delete_tag(&mut self, id: TagId) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM note_tag_cross_ref WHERE tag_id = ?1;", [id])?;
        let changed = tx.execute("DELETE FROM tags WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::tag_not_found(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TAG_SELECT_SQL} WHERE tags.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_tag_row(row)?));
        }
        Ok(None)
    }

    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
        match normalize_tag_name(name) {
            Some(name) => fetch_tag_by_name(self.conn, &name),
            None => Ok(None),
        }
    }

    fn list_tags(&self, order: TagOrder) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TAG_SELECT_SQL} ORDER BY {};",
            order.order_by_sql()
        ))?;
        let tags = stmt
            .query_map([], parse_tag_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn link_note_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<bool> {
        link(self.conn, note_id, tag_id)
    }

    fn unlink_note_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM note_tag_cross_ref WHERE note_id = ?1 AND tag_id = ?2;",
            [note_id, tag_id],
        )?;
        Ok(changed > 0)
    }

    fn clear_note_tag_links(&self, note_id: NoteId) -> RepoResult<usize> {
        clear_links(self.conn, note_id)
    }
}

pub(crate) fn upsert_tag(conn: &Connection, name: &str, color: Option<&str>) -> RepoResult<Tag> {
    let name = normalize_tag_name(name).ok_or(ValidationError::EmptyTagName)?;
    let color = color.unwrap_or(DEFAULT_TAG_COLOR);
    validate_color(color)?;

    conn.execute(
        "INSERT INTO tags (name, color) VALUES (?1, ?2)
         ON CONFLICT(name) DO NOTHING;",
        params![name, color],
    )?;

    fetch_tag_by_name(conn, &name)?
        .ok_or_else(|| RepoError::InvalidData(format!("tag row missing after upsert of `{name}`")))
}

pub(crate) fn link(conn: &Connection, note_id: NoteId, tag_id: TagId) -> RepoResult<bool> {
    let inserted = conn.execute(
        "INSERT INTO note_tag_cross_ref (note_id, tag_id) VALUES (?1, ?2)
         ON CONFLICT(note_id, tag_id) DO NOTHING;",
        [note_id, tag_id],
    )?;
    Ok(inserted > 0)
}

pub(crate) fn clear_links(conn: &Connection, note_id: NoteId) -> RepoResult<usize> {
    let removed = conn.execute(
        "DELETE FROM note_tag_cross_ref WHERE note_id = ?1;",
        [note_id],
    )?;
    Ok(removed)
}

/// Loads the tags linked to one note, ordered by name.
pub(crate) fn load_tags_for_note(conn: &Connection, note_id: NoteId) -> RepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "{TAG_SELECT_SQL}
         INNER JOIN note_tag_cross_ref x ON x.tag_id = tags.id
         WHERE x.note_id = ?1
         ORDER BY {};",
        TagOrder::NameAsc.order_by_sql()
    ))?;
    let tags = stmt
        .query_map([note_id], parse_tag_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

fn fetch_tag_by_name(conn: &Connection, name: &str) -> RepoResult<Option<Tag>> {
    let mut stmt = conn.prepare(&format!("{TAG_SELECT_SQL} WHERE tags.name = ?1;"))?;
    let mut rows = stmt.query([name])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_tag_row(row)?));
    }
    Ok(None)
}

fn parse_tag_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        name: row.get("name")?,
        color: row.get("color")?,
    })
}
