//! SQLite connection handling, schema bootstrap, and resource lifecycle.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the member store.
//! - Apply schema migrations in deterministic order.
//! - Hand out connections through a provider abstraction and release
//!   cursor/statement/connection handles on every exit path.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Every handle acquired by a store operation is released exactly once.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
pub mod provider;
pub mod resource;
pub mod sqlite;

pub use open::{configure_connection, open_db, open_db_in_memory};
pub use provider::{ConnectionProvider, DirectProvider, PoolStatus, PooledProvider};
pub use resource::{
    ConnectionError, DbConnection, DbCursor, DbStatement, Release, ReleaseError, ResourceKind,
    RowData, Scoped, SqlParam, SqlValue, StatementError,
};
pub use sqlite::{SqliteConnection, SqliteCursor, SqliteStatement};

pub type DbResult<T> = Result<T, DbError>;

/// Low-level failure reported by SQLite, the pool, or a handle.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Pool(r2d2::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The handle was used after it had already been released.
    Released(ResourceKind),
    /// Driver failure without a structured cause.
    Driver(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "connection pool error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Released(kind) => write!(f, "{kind} handle already released"),
            Self::Driver(message) => write!(f, "{message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::Released(_) | Self::Driver(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<r2d2::Error> for DbError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}
