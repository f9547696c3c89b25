//! Connection providers: one fresh connection per call, or a bounded pool.
//!
//! # Invariants
//! - Every connection handed out has `foreign_keys=ON` and a busy timeout.
//! - Schema migrations run once when the provider is built, never per acquire.
//! - Providers never retry; an acquisition failure surfaces immediately.

use super::migrations::apply_migrations;
use super::open::{configure_connection, open_db};
use super::resource::{ConnectionError, DbConnection};
use super::sqlite::SqliteConnection;
use super::DbError;
use crate::config::{DataSourceConfig, PoolConfig};
use log::{debug, error, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Source of database connections for the store.
pub trait ConnectionProvider {
    type Connection: DbConnection;

    /// Name used in log events and connection errors.
    fn name(&self) -> &str;

    fn acquire(&self) -> Result<Self::Connection, ConnectionError>;
}

const DIRECT_PROVIDER_NAME: &str = "direct";

/// Opens a new SQLite connection on every `acquire`. Unbounded.
#[derive(Debug, Clone)]
pub struct DirectProvider {
    path: PathBuf,
    busy_timeout: Duration,
}

impl DirectProvider {
    /// Builds the provider and brings the database schema up to date.
    pub fn new(config: &DataSourceConfig) -> Result<Self, ConnectionError> {
        config.validate().map_err(|err| {
            ConnectionError::new(DIRECT_PROVIDER_NAME, DbError::Driver(err.to_string()))
        })?;

        let bootstrap =
            open_db(&config.path).map_err(|err| ConnectionError::new(DIRECT_PROVIDER_NAME, err))?;
        if let Err((_conn, err)) = bootstrap.close() {
            return Err(ConnectionError::new(DIRECT_PROVIDER_NAME, err));
        }

        Ok(Self {
            path: config.path.clone(),
            busy_timeout: config.busy_timeout(),
        })
    }

    fn open(&self) -> Result<Connection, DbError> {
        let conn = Connection::open(&self.path)?;
        configure_connection(&conn, self.busy_timeout)?;
        Ok(conn)
    }
}

impl ConnectionProvider for DirectProvider {
    type Connection = SqliteConnection;

    fn name(&self) -> &str {
        DIRECT_PROVIDER_NAME
    }

    fn acquire(&self) -> Result<SqliteConnection, ConnectionError> {
        let started_at = Instant::now();
        match self.open() {
            Ok(conn) => {
                debug!(
                    "event=conn_acquire module=db status=ok provider={} duration_ms={}",
                    DIRECT_PROVIDER_NAME,
                    started_at.elapsed().as_millis()
                );
                Ok(SqliteConnection::direct(conn))
            }
            Err(err) => {
                error!(
                    "event=conn_acquire module=db status=error provider={} duration_ms={} error={}",
                    DIRECT_PROVIDER_NAME,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(ConnectionError::new(DIRECT_PROVIDER_NAME, err))
            }
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Bounded, named `r2d2` pool of SQLite connections.
#[derive(Clone)]
pub struct PooledProvider {
    name: String,
    pool: Pool<SqliteConnectionManager>,
}

impl PooledProvider {
    /// Builds the pool, opening its idle connections, and applies migrations.
    pub fn new(source: &DataSourceConfig, config: &PoolConfig) -> Result<Self, ConnectionError> {
        let name = config.pool_name.clone();
        let invalid =
            |message: String| ConnectionError::new(name.clone(), DbError::Driver(message));
        source.validate().map_err(|err| invalid(err.to_string()))?;
        config.validate().map_err(|err| invalid(err.to_string()))?;

        let started_at = Instant::now();
        info!(
            "event=pool_init module=db status=start pool={} max_size={}",
            name, config.max_size
        );

        let busy_timeout = source.busy_timeout();
        let manager = SqliteConnectionManager::file(&source.path).with_init(move |conn| {
            configure_connection(conn, busy_timeout)?;
            conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get::<_, String>(0))?;
            Ok(())
        });

        let built = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout())
            .build(manager)
            .map_err(DbError::from)
            .and_then(|pool| {
                let mut conn = pool.get()?;
                apply_migrations(&mut conn)?;
                Ok(pool)
            });

        match built {
            Ok(pool) => {
                info!(
                    "event=pool_init module=db status=ok pool={} duration_ms={}",
                    name,
                    started_at.elapsed().as_millis()
                );
                Ok(Self { name, pool })
            }
            Err(err) => {
                error!(
                    "event=pool_init module=db status=error pool={} duration_ms={} error={}",
                    name,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(ConnectionError::new(name, err))
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }
}

impl ConnectionProvider for PooledProvider {
    type Connection = SqliteConnection;

    fn name(&self) -> &str {
        &self.name
    }

    fn acquire(&self) -> Result<SqliteConnection, ConnectionError> {
        let started_at = Instant::now();
        match self.pool.get() {
            Ok(conn) => {
                debug!(
                    "event=conn_acquire module=db status=ok provider={} duration_ms={}",
                    self.name,
                    started_at.elapsed().as_millis()
                );
                Ok(SqliteConnection::pooled(conn))
            }
            Err(err) => {
                error!(
                    "event=conn_acquire module=db status=error provider={} duration_ms={} error={}",
                    self.name,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(ConnectionError::new(self.name.clone(), err))
            }
        }
    }
}
