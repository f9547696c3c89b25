//! Resource-safe data access for member records.
//!
//! A [`MemberStore`] runs one statement per call on a connection obtained from
//! a [`ConnectionProvider`], and releases cursor, statement, and connection on
//! every exit path.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use config::{ConfigError, DataSourceConfig, LogConfig, PoolConfig};
pub use db::{
    ConnectionError, ConnectionProvider, DbError, DirectProvider, PoolStatus, PooledProvider,
    ReleaseError, ResourceKind, StatementError,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::member::{Member, MemberId};
pub use repo::member_repo::{MemberRepository, MemberStore, RepoError, RepoResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
