//! Handle contracts and scoped release for connection/statement/cursor.
//!
//! # Responsibility
//! - Describe the three handle kinds a store operation acquires.
//! - Release each handle exactly once, innermost first, on every exit path.
//!
//! # Invariants
//! - A `Scoped` guard releases its handle when dropped, including during unwinding.
//! - A failed release is logged and never prevents sibling releases.
//! - Releasing an already-released handle is a no-op.

use super::DbError;
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};

/// Kind of database resource held by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Connection,
    Statement,
    Cursor,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Statement => "statement",
            Self::Cursor => "cursor",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The provider could not supply a connection.
#[derive(Debug)]
pub struct ConnectionError {
    pub provider: String,
    pub source: DbError,
}

impl ConnectionError {
    pub fn new(provider: impl Into<String>, source: impl Into<DbError>) -> Self {
        Self {
            provider: provider.into(),
            source: source.into(),
        }
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to acquire connection from `{}`: {}",
            self.provider, self.source
        )
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// The driver rejected preparing, executing, or reading a statement.
#[derive(Debug)]
pub struct StatementError {
    pub sql: &'static str,
    pub source: DbError,
}

impl StatementError {
    pub fn new(sql: &'static str, source: impl Into<DbError>) -> Self {
        Self {
            sql,
            source: source.into(),
        }
    }

    /// Returns `true` when SQLite rejected the statement on a constraint,
    /// e.g. a duplicate primary key.
    pub fn is_constraint_violation(&self) -> bool {
        match &self.source {
            DbError::Sqlite(err) => {
                err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
            }
            _ => false,
        }
    }
}

impl Display for StatementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "statement `{}` failed: {}", self.sql, self.source)
    }
}

impl Error for StatementError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Cleanup of a single handle failed. Logged, never returned by store operations.
#[derive(Debug)]
pub struct ReleaseError {
    pub resource: ResourceKind,
    pub source: DbError,
}

impl ReleaseError {
    pub fn new(resource: ResourceKind, source: impl Into<DbError>) -> Self {
        Self {
            resource,
            source: source.into(),
        }
    }
}

impl Display for ReleaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to release {}: {}", self.resource, self.source)
    }
}

impl Error for ReleaseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Positional statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlParam<'a> {
    Text(&'a str),
    Integer(i64),
}

/// Column value read back from a cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// One result row as ordered column-name/value pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowData {
    columns: Vec<(String, SqlValue)>,
}

impl RowData {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    /// Looks up a column by name, ignoring ASCII case.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    pub fn text(&self, column: &str) -> Result<&str, DbError> {
        match self.get(column) {
            Some(SqlValue::Text(value)) => Ok(value.as_str()),
            Some(other) => Err(DbError::Driver(format!(
                "column `{column}` is not text: {other:?}"
            ))),
            None => Err(missing_column(column)),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, DbError> {
        match self.get(column) {
            Some(SqlValue::Integer(value)) => Ok(*value),
            Some(other) => Err(DbError::Driver(format!(
                "column `{column}` is not an integer: {other:?}"
            ))),
            None => Err(missing_column(column)),
        }
    }
}

fn missing_column(column: &str) -> DbError {
    DbError::Driver(format!("column `{column}` missing from result row"))
}

/// A handle that must be explicitly released.
pub trait Release {
    /// Releases the underlying resource. Calling it again is a no-op.
    fn release(&mut self) -> Result<(), ReleaseError>;
}

/// A connection obtained from a [`ConnectionProvider`](super::ConnectionProvider).
pub trait DbConnection: Release {
    type Statement<'c>: DbStatement
    where
        Self: 'c;

    fn prepare(&self, sql: &'static str) -> Result<Self::Statement<'_>, StatementError>;
}

/// A prepared statement bound to its connection.
pub trait DbStatement: Release {
    type Cursor<'s>: DbCursor
    where
        Self: 's;

    /// Executes a write statement and returns the number of affected rows.
    fn execute(&mut self, params: &[SqlParam<'_>]) -> Result<usize, StatementError>;

    fn query(&mut self, params: &[SqlParam<'_>]) -> Result<Self::Cursor<'_>, StatementError>;
}

/// Forward-only result cursor.
pub trait DbCursor: Release {
    fn next_row(&mut self) -> Result<Option<RowData>, StatementError>;
}

/// Owns one handle and releases it when dropped.
///
/// Guards declared later are dropped first, so acquiring connection, then
/// statement, then cursor releases them as cursor, statement, connection.
pub struct Scoped<R: Release> {
    kind: ResourceKind,
    resource: R,
}

impl<R: Release> Scoped<R> {
    pub fn new(kind: ResourceKind, resource: R) -> Self {
        Self { kind, resource }
    }
}

impl<R: Release> Deref for Scoped<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}

impl<R: Release> DerefMut for Scoped<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.resource
    }
}

impl<R: Release> Drop for Scoped<R> {
    fn drop(&mut self) {
        match self.resource.release() {
            Ok(()) => debug!(
                "event=resource_release module=db status=ok resource={}",
                self.kind
            ),
            Err(err) => warn!(
                "event=resource_release module=db status=error resource={} error={}",
                self.kind, err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Release, ReleaseError, ResourceKind, RowData, Scoped, SqlValue};
    use crate::db::DbError;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Probe {
        kind: ResourceKind,
        fail: bool,
        log: CallLog,
    }

    impl Release for Probe {
        fn release(&mut self) -> Result<(), ReleaseError> {
            self.log.borrow_mut().push(self.kind);
            if self.fail {
                return Err(ReleaseError::new(
                    self.kind,
                    DbError::Driver("boom".to_string()),
                ));
            }
            Ok(())
        }
    }

    type CallLog = Rc<RefCell<Vec<ResourceKind>>>;

    fn probe(kind: ResourceKind, fail: bool, log: &CallLog) -> Scoped<Probe> {
        Scoped::new(
            kind,
            Probe {
                kind,
                fail,
                log: Rc::clone(log),
            },
        )
    }

    #[test]
    fn guards_release_in_reverse_acquisition_order_despite_failures() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let _conn = probe(ResourceKind::Connection, false, &log);
            let _stmt = probe(ResourceKind::Statement, true, &log);
            let _cursor = probe(ResourceKind::Cursor, true, &log);
        }
        assert_eq!(
            *log.borrow(),
            vec![
                ResourceKind::Cursor,
                ResourceKind::Statement,
                ResourceKind::Connection
            ]
        );
    }

    #[test]
    fn row_lookup_ignores_column_case() {
        let row = RowData::new(vec![
            ("MEMBER_ID".to_string(), SqlValue::Text("u1".to_string())),
            ("MONEY".to_string(), SqlValue::Integer(10)),
        ]);
        assert_eq!(row.text("member_id").unwrap(), "u1");
        assert_eq!(row.integer("money").unwrap(), 10);
        assert!(row.integer("member_id").is_err());
        assert!(row.text("missing").is_err());
    }
}
