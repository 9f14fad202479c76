//! dbpulse-mysql — [`QueryExecutor`] over an sqlx MySQL pool.
//!
//! Read-only statements go out over the text protocol, so every non-null
//! column arrives as a string and the core decodes it. A cursor holds the
//! pooled connection until it is released or dropped.
//!
//! # Architecture
//!
//! ```text
//! MySqlExecutor (MySqlPool, connected lazily)
//!   ├── query()          → MySqlCursor (row stream, first row pre-fetched)
//!   ├── execute()        → rows affected
//!   └── server_version() → SELECT VERSION() → ServerVersion::parse
//! ```

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sqlx::Row as _;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Executor;
use thiserror::Error;
use tracing::{debug, trace};

use dbpulse_core::{
    MaintenanceSql, QueryError, QueryExecutor, ReadOnlySql, Row, RowCursor, ServerVersion, Value,
};

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid mysql dsn: {0}")]
    InvalidDsn(#[source] sqlx::Error),
}

/// Pool-backed executor shared by every scrape.
#[derive(Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl std::fmt::Debug for MySqlExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlExecutor")
            .field("size", &self.pool.size())
            .field("idle", &self.pool.num_idle())
            .finish()
    }
}

impl MySqlExecutor {
    /// Build a pool for `dsn` without connecting.
    ///
    /// Connections are opened on first use, so the exporter can start while
    /// the server is down and report `mysql_up 0` until it comes back.
    pub fn connect(
        dsn: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let options = MySqlConnectOptions::from_str(dsn).map_err(ConnectError::InvalidDsn)?;
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options);

        debug!(max_connections, ?acquire_timeout, "mysql pool configured");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn query<'a>(
        &'a self,
        sql: &'a ReadOnlySql,
    ) -> Result<Box<dyn RowCursor + 'a>, QueryError> {
        trace!(sql = sql.as_str(), "issuing query");
        let mut stream = (&self.pool).fetch(sql.as_str());

        // Execution errors surface on the first poll; report them as a
        // failed query rather than a failed row.
        let pending = match stream.next().await {
            Some(Ok(row)) => Some(row),
            Some(Err(e)) => return Err(query_error(e)),
            None => None,
        };

        Ok(Box::new(MySqlCursor {
            pending,
            stream: Some(stream),
        }))
    }

    async fn execute(&self, sql: &MaintenanceSql) -> Result<u64, QueryError> {
        let result = (&self.pool)
            .execute(sql.as_str())
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected())
    }

    async fn server_version(&self) -> Result<ServerVersion, QueryError> {
        let raw: String = sqlx::query_scalar("SELECT VERSION()")
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;
        ServerVersion::parse(&raw)
    }
}

/// Cursor over one streaming result set.
pub struct MySqlCursor<'a> {
    pending: Option<MySqlRow>,
    stream: Option<BoxStream<'a, Result<MySqlRow, sqlx::Error>>>,
}

#[async_trait]
impl RowCursor for MySqlCursor<'_> {
    async fn next_row(&mut self) -> Result<Option<Row>, QueryError> {
        if let Some(row) = self.pending.take() {
            return convert_row(&row).map(Some);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match stream.next().await {
            Some(Ok(row)) => convert_row(&row).map(Some),
            Some(Err(e)) => Err(query_error(e)),
            None => {
                self.stream = None;
                Ok(None)
            }
        }
    }

    fn release(&mut self) {
        self.pending = None;
        // Dropping the stream hands the connection back to the pool.
        self.stream = None;
    }
}

/// Every column as text, or null.
fn convert_row(row: &MySqlRow) -> Result<Row, QueryError> {
    let mut values = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        let value: Option<String> = row.try_get_unchecked(idx).map_err(query_error)?;
        values.push(value.map_or(Value::Null, Value::Text));
    }
    Ok(Row::new(values))
}

fn query_error(err: sqlx::Error) -> QueryError {
    QueryError::new(err.to_string())
}
