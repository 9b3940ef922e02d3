//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide note CRUD, listing and substring search over `notes`.
//! - Cascade link cleanup on delete, since the schema does not.
//!
//! # Invariants
//! - Inserts ignore any caller-supplied id; the store assigns identity and
//!   both timestamps.
//! - Updates refresh `updated_at` and never touch `created_at`.
//! - Deleting a note removes its `note_tag_cross_ref` rows in the same
//!   transaction.

use super::{RepoError, RepoResult, NOW_MS_SQL};
use crate::model::note::{Note, NoteId};
use crate::model::tag::TagId;
use rusqlite::{params, Connection, Row, TransactionBehavior};

pub(crate) const NOTE_SELECT_SQL: &str = "SELECT
    notes.id,
    notes.title,
    notes.content,
    notes.category,
    notes.created_at,
    notes.updated_at
FROM notes";

/// Sort order for note listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteOrder {
    /// Newest identity first.
    #[default]
    IdDesc,
    /// Most recently edited first; ties broken by id.
    UpdatedAtDesc,
    /// Most recently created first; ties broken by id.
    CreatedAtDesc,
    /// Alphabetical by title, ASCII case-insensitive.
    TitleAsc,
}

impl NoteOrder {
    pub(crate) fn order_by_sql(self) -> &'static str {
        match self {
            Self::IdDesc => "notes.id DESC",
            Self::UpdatedAtDesc => "notes.updated_at DESC, notes.id DESC",
            Self::CreatedAtDesc => "notes.created_at DESC, notes.id DESC",
            Self::TitleAsc => "notes.title COLLATE NOCASE ASC, notes.id ASC",
        }
    }
}

/// Repository interface for note operations.
pub trait NoteRepository {
    /// Inserts a note with a fresh identity and returns it.
    fn create_note(&self, note: &Note) -> RepoResult<NoteId>;
    /// Replaces title/content/category of an existing note.
    fn update_note(&self, note: &Note) -> RepoResult<()>;
    /// Removes a note together with its tag links.
    fn delete_note(&mut self, id: NoteId) -> RepoResult<()>;
    /// Removes every note and link; returns the number of notes removed.
    fn delete_all_notes(&mut self) -> RepoResult<usize>;
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    fn list_notes(&self, order: NoteOrder) -> RepoResult<Vec<Note>>;
    /// Case-insensitive substring match on title or content, `id DESC`.
    ///
    /// An empty substring behaves like `list_notes(NoteOrder::IdDesc)`.
    fn search_notes(&self, substring: &str) -> RepoResult<Vec<Note>>;
    /// Notes linked to `tag_id`, most recently edited first.
    fn list_notes_by_tag(&self, tag_id: TagId) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Wraps a connection that already carries the current schema.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Wraps a connection after checking the required tables exist.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        super::ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&self, note: &Note) -> RepoResult<NoteId> {
        insert_note(self.conn, note)
    }

    fn update_note(&self, note: &Note) -> RepoResult<()> {
        update_note_row(self.conn, note)
    }

    fn delete_note(&mut self, id: NoteId) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM note_tag_cross_ref WHERE note_id = ?1;", [id])?;
        let changed = tx.execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::note_not_found(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_all_notes(&mut self) -> RepoResult<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM note_tag_cross_ref;", [])?;
        let removed = tx.execute("DELETE FROM notes;", [])?;
        tx.commit()?;
        Ok(removed)
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        fetch_note(self.conn, id)
    }

    fn list_notes(&self, order: NoteOrder) -> RepoResult<Vec<Note>> {
        list_notes_ordered(self.conn, order)
    }

    fn search_notes(&self, substring: &str) -> RepoResult<Vec<Note>> {
        if substring.is_empty() {
            return list_notes_ordered(self.conn, NoteOrder::IdDesc);
        }

        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE title LIKE ?1 ESCAPE '\\'
                OR content LIKE ?1 ESCAPE '\\'
             ORDER BY {};",
            NoteOrder::IdDesc.order_by_sql()
        ))?;
        let pattern = like_pattern(substring);
        let notes = stmt
            .query_map([pattern.as_str()], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    fn list_notes_by_tag(&self, tag_id: TagId) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             INNER JOIN note_tag_cross_ref x ON x.note_id = notes.id
             WHERE x.tag_id = ?1
             ORDER BY {};",
            NoteOrder::UpdatedAtDesc.order_by_sql()
        ))?;
        let notes = stmt
            .query_map([tag_id], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }
}

pub(crate) fn insert_note(conn: &Connection, note: &Note) -> RepoResult<NoteId> {
    note.validate()?;
    conn.execute(
        &format!(
            "INSERT INTO notes (title, content, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, {NOW_MS_SQL}, {NOW_MS_SQL});"
        ),
        params![note.title, note.content, note.category],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn update_note_row(conn: &Connection, note: &Note) -> RepoResult<()> {
    note.validate()?;
    let changed = conn.execute(
        &format!(
            "UPDATE notes
             SET
                title = ?2,
                content = ?3,
                category = ?4,
                updated_at = {NOW_MS_SQL}
             WHERE id = ?1;"
        ),
        params![note.id, note.title, note.content, note.category],
    )?;
    if changed == 0 {
        return Err(RepoError::note_not_found(note.id));
    }
    Ok(())
}

pub(crate) fn fetch_note(conn: &Connection, id: NoteId) -> RepoResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE notes.id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_note_row(row)?));
    }
    Ok(None)
}

pub(crate) fn list_notes_ordered(conn: &Connection, order: NoteOrder) -> RepoResult<Vec<Note>> {
    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL} ORDER BY {};",
        order.order_by_sql()
    ))?;
    let notes = stmt
        .query_map([], parse_note_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(notes)
}

fn parse_note_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        category: row.get("category")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Builds a `%needle%` LIKE pattern with `\` escaping for wildcards.
fn like_pattern(substring: &str) -> String {
    let mut pattern = String::with_capacity(substring.len() + 2);
    pattern.push('%');
    for ch in substring.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("wor"), "%wor%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
