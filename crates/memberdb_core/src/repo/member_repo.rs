//! Member repository contract and provider-backed implementation.
//!
//! # Responsibility
//! - Provide create/read/update/delete over the `MEMBER` table.
//! - Keep SQL and row mapping inside the persistence boundary.
//!
//! # Invariants
//! - Each operation acquires one connection and runs one statement.
//! - Cursor, statement, and connection are released in that order on every
//!   exit path; release failures are logged and never replace the result.
//! - Parameters are bound positionally; SQL text is fixed per operation.
//! - Update/delete report the affected row count; zero rows is not an error.

use crate::db::{
    ConnectionError, ConnectionProvider, DbConnection, DbCursor, DbStatement, ResourceKind,
    RowData, Scoped, SqlParam, StatementError,
};
use crate::model::member::{Member, MemberId};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const INSERT_SQL: &str = "INSERT INTO MEMBER(MEMBER_ID, MONEY) VALUES (?, ?)";
const SELECT_BY_ID_SQL: &str = "SELECT * FROM MEMBER WHERE MEMBER_ID = ?";
const UPDATE_MONEY_SQL: &str = "UPDATE MEMBER SET MONEY=? WHERE MEMBER_ID=?";
const DELETE_SQL: &str = "DELETE FROM MEMBER WHERE MEMBER_ID=?";

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure surfaced by member repository operations.
#[derive(Debug)]
pub enum RepoError {
    Connection(ConnectionError),
    Statement(StatementError),
    NotFound(MemberId),
}

impl RepoError {
    /// Returns `true` for a rejected insert of an existing member id.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Statement(err) if err.is_constraint_violation())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(err) => write!(f, "{err}"),
            Self::Statement(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "member not found: member_id={id}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connection(err) => Some(err),
            Self::Statement(err) => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<ConnectionError> for RepoError {
    fn from(value: ConnectionError) -> Self {
        Self::Connection(value)
    }
}

impl From<StatementError> for RepoError {
    fn from(value: StatementError) -> Self {
        Self::Statement(value)
    }
}

/// Repository interface for member CRUD operations.
pub trait MemberRepository {
    /// Inserts `member` and returns the stored record.
    fn save(&self, member: &Member) -> RepoResult<Member>;
    fn find_by_id(&self, member_id: &str) -> RepoResult<Member>;
    /// Overwrites the balance and returns the number of rows changed.
    fn update_balance(&self, member_id: &str, money: i64) -> RepoResult<usize>;
    /// Removes the member and returns the number of rows deleted.
    fn delete(&self, member_id: &str) -> RepoResult<usize>;
}

/// Member repository backed by any [`ConnectionProvider`].
///
/// Holds no state besides the provider, so it is `Send + Sync` whenever the
/// provider is.
pub struct MemberStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> MemberStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn execute_write(&self, sql: &'static str, params: &[SqlParam<'_>]) -> RepoResult<usize> {
        let conn = Scoped::new(ResourceKind::Connection, self.provider.acquire()?);
        let mut stmt = Scoped::new(ResourceKind::Statement, conn.prepare(sql)?);
        let changed = stmt.execute(params)?;
        Ok(changed)
    }

    fn query_first(&self, sql: &'static str, params: &[SqlParam<'_>]) -> RepoResult<Option<RowData>> {
        let conn = Scoped::new(ResourceKind::Connection, self.provider.acquire()?);
        let mut stmt = Scoped::new(ResourceKind::Statement, conn.prepare(sql)?);
        let mut cursor = Scoped::new(ResourceKind::Cursor, stmt.query(params)?);
        let row = cursor.next_row()?;
        Ok(row)
    }

    fn log_failure(&self, event: &str, member_id: &str, started_at: Instant, err: &RepoError) {
        error!(
            "event={} module=repo status=error provider={} member_id={} duration_ms={} error={}",
            event,
            self.provider.name(),
            member_id,
            started_at.elapsed().as_millis(),
            err
        );
    }
}

impl<P: ConnectionProvider> MemberRepository for MemberStore<P> {
    fn save(&self, member: &Member) -> RepoResult<Member> {
        let started_at = Instant::now();
        let params = [
            SqlParam::Text(&member.member_id),
            SqlParam::Integer(member.money),
        ];

        match self.execute_write(INSERT_SQL, &params) {
            Ok(_) => {
                info!(
                    "event=member_save module=repo status=ok member_id={} duration_ms={}",
                    member.member_id,
                    started_at.elapsed().as_millis()
                );
                Ok(member.clone())
            }
            Err(err) => {
                self.log_failure("member_save", &member.member_id, started_at, &err);
                Err(err)
            }
        }
    }

    fn find_by_id(&self, member_id: &str) -> RepoResult<Member> {
        let started_at = Instant::now();
        let result = self
            .query_first(SELECT_BY_ID_SQL, &[SqlParam::Text(member_id)])
            .and_then(|row| match row {
                Some(row) => parse_member_row(&row),
                None => Err(RepoError::NotFound(member_id.to_string())),
            });

        match &result {
            Ok(_) => info!(
                "event=member_find module=repo status=ok member_id={} duration_ms={}",
                member_id,
                started_at.elapsed().as_millis()
            ),
            Err(RepoError::NotFound(_)) => info!(
                "event=member_find module=repo status=not_found member_id={} duration_ms={}",
                member_id,
                started_at.elapsed().as_millis()
            ),
            Err(err) => self.log_failure("member_find", member_id, started_at, err),
        }
        result
    }

    fn update_balance(&self, member_id: &str, money: i64) -> RepoResult<usize> {
        let started_at = Instant::now();
        let params = [SqlParam::Integer(money), SqlParam::Text(member_id)];

        match self.execute_write(UPDATE_MONEY_SQL, &params) {
            Ok(0) => {
                warn!(
                    "event=member_update module=repo status=ok member_id={} rows_affected=0 duration_ms={}",
                    member_id,
                    started_at.elapsed().as_millis()
                );
                Ok(0)
            }
            Ok(changed) => {
                info!(
                    "event=member_update module=repo status=ok member_id={} rows_affected={} duration_ms={}",
                    member_id,
                    changed,
                    started_at.elapsed().as_millis()
                );
                Ok(changed)
            }
            Err(err) => {
                self.log_failure("member_update", member_id, started_at, &err);
                Err(err)
            }
        }
    }

    fn delete(&self, member_id: &str) -> RepoResult<usize> {
        let started_at = Instant::now();

        match self.execute_write(DELETE_SQL, &[SqlParam::Text(member_id)]) {
            Ok(changed) => {
                info!(
                    "event=member_delete module=repo status=ok member_id={} rows_affected={} duration_ms={}",
                    member_id,
                    changed,
                    started_at.elapsed().as_millis()
                );
                Ok(changed)
            }
            Err(err) => {
                self.log_failure("member_delete", member_id, started_at, &err);
                Err(err)
            }
        }
    }
}

fn parse_member_row(row: &RowData) -> RepoResult<Member> {
    let mapped = row
        .text("member_id")
        .map(str::to_owned)
        .and_then(|member_id| Ok(Member::new(member_id, row.integer("money")?)));
    mapped.map_err(|err| RepoError::Statement(StatementError::new(SELECT_BY_ID_SQL, err)))
}

#[cfg(test)]
mod tests {
    use super::parse_member_row;
    use crate::db::{RowData, SqlValue};

    #[test]
    fn parse_member_row_maps_by_column_name() {
        let row = RowData::new(vec![
            ("MONEY".to_string(), SqlValue::Integer(500)),
            ("MEMBER_ID".to_string(), SqlValue::Text("m9".to_string())),
        ]);
        let member = parse_member_row(&row).unwrap();
        assert_eq!(member.member_id, "m9");
        assert_eq!(member.money, 500);
    }

    #[test]
    fn parse_member_row_rejects_non_integer_money() {
        let row = RowData::new(vec![
            ("MEMBER_ID".to_string(), SqlValue::Text("m9".to_string())),
            ("MONEY".to_string(), SqlValue::Text("lots".to_string())),
        ]);
        let err = parse_member_row(&row).unwrap_err();
        assert!(err.to_string().contains("not an integer"));
    }
}
