//! rusqlite-backed connection, statement, and cursor handles.
//!
//! # Invariants
//! - Direct connections are released with `Connection::close`, pooled ones by
//!   handing them back to the pool.
//! - Statements are released with `Statement::finalize`.
//! - A released handle rejects further use with `DbError::Released`.

use super::resource::{
    DbConnection, DbCursor, DbStatement, Release, ReleaseError, ResourceKind, RowData, SqlParam,
    SqlValue, StatementError,
};
use super::DbError;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Rows, Statement, ToSql};

pub(crate) type PooledSqlite = PooledConnection<SqliteConnectionManager>;

enum Handle {
    Direct(Connection),
    Pooled(PooledSqlite),
}

/// Connection handed out by the SQLite providers.
pub struct SqliteConnection {
    handle: Option<Handle>,
}

impl SqliteConnection {
    pub(crate) fn direct(conn: Connection) -> Self {
        Self {
            handle: Some(Handle::Direct(conn)),
        }
    }

    pub(crate) fn pooled(conn: PooledSqlite) -> Self {
        Self {
            handle: Some(Handle::Pooled(conn)),
        }
    }

    /// Returns `true` when the connection came from a pool.
    pub fn is_pooled(&self) -> bool {
        matches!(self.handle, Some(Handle::Pooled(_)))
    }

    fn raw(&self) -> Option<&Connection> {
        match self.handle.as_ref()? {
            Handle::Direct(conn) => Some(conn),
            Handle::Pooled(conn) => Some(&**conn),
        }
    }
}

impl Release for SqliteConnection {
    fn release(&mut self) -> Result<(), ReleaseError> {
        match self.handle.take() {
            Some(Handle::Direct(conn)) => conn
                .close()
                .map_err(|(_conn, err)| ReleaseError::new(ResourceKind::Connection, err)),
            // Dropping a pooled connection returns it to the pool.
            Some(Handle::Pooled(conn)) => {
                drop(conn);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl DbConnection for SqliteConnection {
    type Statement<'c> = SqliteStatement<'c>;

    fn prepare(&self, sql: &'static str) -> Result<SqliteStatement<'_>, StatementError> {
        let conn = self
            .raw()
            .ok_or_else(|| StatementError::new(sql, DbError::Released(ResourceKind::Connection)))?;
        let stmt = conn
            .prepare(sql)
            .map_err(|err| StatementError::new(sql, err))?;
        Ok(SqliteStatement {
            sql,
            stmt: Some(stmt),
        })
    }
}

/// Prepared statement borrowed from a [`SqliteConnection`].
pub struct SqliteStatement<'c> {
    sql: &'static str,
    stmt: Option<Statement<'c>>,
}

impl<'c> SqliteStatement<'c> {
    fn live(&mut self) -> Result<&mut Statement<'c>, StatementError> {
        let sql = self.sql;
        self.stmt
            .as_mut()
            .ok_or_else(|| StatementError::new(sql, DbError::Released(ResourceKind::Statement)))
    }
}

impl Release for SqliteStatement<'_> {
    fn release(&mut self) -> Result<(), ReleaseError> {
        match self.stmt.take() {
            Some(stmt) => stmt
                .finalize()
                .map_err(|err| ReleaseError::new(ResourceKind::Statement, err)),
            None => Ok(()),
        }
    }
}

impl<'c> DbStatement for SqliteStatement<'c> {
    type Cursor<'s> = SqliteCursor<'s> where Self: 's;

    fn execute(&mut self, params: &[SqlParam<'_>]) -> Result<usize, StatementError> {
        let sql = self.sql;
        self.live()?
            .execute(params_from_iter(params.iter()))
            .map_err(|err| StatementError::new(sql, err))
    }

    fn query(&mut self, params: &[SqlParam<'_>]) -> Result<SqliteCursor<'_>, StatementError> {
        let sql = self.sql;
        let stmt = self.live()?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(|err| StatementError::new(sql, err))?;
        Ok(SqliteCursor {
            sql,
            columns,
            rows: Some(rows),
        })
    }
}

/// Result cursor borrowed from a [`SqliteStatement`].
pub struct SqliteCursor<'s> {
    sql: &'static str,
    columns: Vec<String>,
    rows: Option<Rows<'s>>,
}

impl Release for SqliteCursor<'_> {
    fn release(&mut self) -> Result<(), ReleaseError> {
        // Dropping `Rows` resets the statement.
        self.rows.take();
        Ok(())
    }
}

impl DbCursor for SqliteCursor<'_> {
    fn next_row(&mut self) -> Result<Option<RowData>, StatementError> {
        let sql = self.sql;
        let rows = self
            .rows
            .as_mut()
            .ok_or_else(|| StatementError::new(sql, DbError::Released(ResourceKind::Cursor)))?;
        let Some(row) = rows.next().map_err(|err| StatementError::new(sql, err))? else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for (index, name) in self.columns.iter().enumerate() {
            let value = row
                .get_ref(index)
                .map_err(|err| StatementError::new(sql, err))?;
            values.push((name.clone(), SqlValue::from(value)));
        }
        Ok(Some(RowData::new(values)))
    }
}

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Self::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
        })
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(value) => Self::Integer(value),
            ValueRef::Real(value) => Self::Real(value),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}
