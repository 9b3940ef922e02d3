//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for notes, tags, links
//!   and the note-with-tags composite.
//! - Isolate SQLite query details from the store and coordinator.
//!
//! # Invariants
//! - Write paths validate entities before any SQL mutation.
//! - Missing rows on update/delete surface as `NotFound` with no state change.
//! - Duplicate link inserts are absorbed; every other constraint failure is
//!   reported as `ConstraintViolation`.

use crate::db::DbError;
use crate::model::ValidationError;
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod note_repo;
pub mod note_with_tags_repo;
pub mod tag_repo;

/// SQL expression yielding the current time in epoch milliseconds.
pub(crate) const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity family referenced by `RepoError::NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Note,
    Tag,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Note => write!(f, "note"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

/// Error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Entity failed field validation; nothing was written.
    Validation(ValidationError),
    /// Update/delete targeted an id that does not exist.
    NotFound { entity: EntityKind, id: i64 },
    /// Uniqueness or foreign-key rule rejected the write.
    ConstraintViolation(String),
    /// Underlying storage failure.
    Db(DbError),
    /// Persisted rows do not match the expected shape.
    InvalidData(String),
    /// A previous holder of the connection lock panicked.
    LockPoisoned,
    /// Connection is missing a table the repositories need.
    MissingRequiredTable(&'static str),
}

impl RepoError {
    pub(crate) fn note_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: EntityKind::Note,
            id,
        }
    }

    pub(crate) fn tag_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: EntityKind::Tag,
            id,
        }
    }

    /// Returns whether this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::Db(_) => "storage_io",
            Self::InvalidData(_) => "invalid_data",
            Self::LockPoisoned => "lock_poisoned",
            Self::MissingRequiredTable(_) => "missing_table",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::LockPoisoned => write!(f, "store connection lock poisoned"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(err, message)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(message.unwrap_or_else(|| err.to_string()))
            }
            other => Self::Db(DbError::Sqlite(other)),
        }
    }
}

/// Verifies the tables every repository reads from are present.
pub fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    for table in ["notes", "tags", "note_tag_cross_ref"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
