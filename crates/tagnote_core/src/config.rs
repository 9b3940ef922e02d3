//! Core configuration and bootstrap.
//!
//! # Responsibility
//! - Describe where the database lives and how the store is tuned.
//! - Bring logging and storage up in the right order.

use crate::logging::{init_logging, LogConfig};
use crate::repo::RepoError;
use crate::store::{NoteStore, DEFAULT_CHANGE_BUS_CAPACITY};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Database placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseLocation {
    /// Private in-memory database, discarded with the store.
    Memory,
    /// SQLite file at an absolute path; created when missing.
    File { path: PathBuf },
}

/// Top-level configuration for the notes core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database: DatabaseLocation,
    pub busy_timeout_ms: u64,
    pub change_bus_capacity: usize,
    pub logging: Option<LogConfig>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            change_bus_capacity: DEFAULT_CHANGE_BUS_CAPACITY,
            logging: None,
        }
    }
}

impl CoreConfig {
    /// File-backed configuration with defaults elsewhere.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseLocation::File { path: path.into() },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.change_bus_capacity == 0 {
            return Err(ConfigError::InvalidBusCapacity);
        }
        if let DatabaseLocation::File { path } = &self.database {
            if !path.is_absolute() {
                return Err(ConfigError::RelativeDatabasePath(path.clone()));
            }
        }
        Ok(())
    }
}

/// Configuration or bootstrap failure.
#[derive(Debug)]
pub enum ConfigError {
    InvalidBusCapacity,
    RelativeDatabasePath(PathBuf),
    Logging(String),
    Store(RepoError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBusCapacity => write!(f, "change_bus_capacity must be at least 1"),
            Self::RelativeDatabasePath(path) => write!(
                f,
                "database path must be absolute, got `{}`",
                path.display()
            ),
            Self::Logging(message) => write!(f, "logging init failed: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ConfigError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Validates `config`, starts logging when configured, then opens the store.
pub fn bootstrap(config: &CoreConfig) -> Result<Arc<NoteStore>, ConfigError> {
    config.validate()?;
    if let Some(log_config) = &config.logging {
        init_logging(log_config).map_err(ConfigError::Logging)?;
    }
    let store = NoteStore::open(config)?;
    info!(
        "event=core_bootstrap module=core status=ok bus_capacity={}",
        config.change_bus_capacity
    );
    Ok(Arc::new(store))
}
