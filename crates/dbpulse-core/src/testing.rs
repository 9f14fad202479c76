//! In-memory [`QueryExecutor`] for tests.
//!
//! Each statement can be given a [`Script`]: the rows to return, a query
//! failure, or a hang that only cancellation can end. The executor records
//! what was issued, how many rows were read and how many cursors were
//! released.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::QueryError;
use crate::source::{MaintenanceSql, QueryExecutor, ReadOnlySql, Row, RowCursor, Value};
use crate::version::ServerVersion;

/// Scripted response to one statement.
#[derive(Debug, Clone, Default)]
pub struct Script {
    rows: Vec<Result<Row, QueryError>>,
    query_error: Option<QueryError>,
    hang_on_query: bool,
    hang_after_rows: bool,
}

impl Script {
    /// Return these rows, then end the result set.
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }

    /// Single-column rows, one per value.
    pub fn column(values: Vec<Value>) -> Self {
        Self::rows(values.into_iter().map(|v| Row::new(vec![v])).collect())
    }

    /// Fail when the statement is issued.
    pub fn failing(message: &str) -> Self {
        Self {
            query_error: Some(QueryError::new(message)),
            ..Self::default()
        }
    }

    /// Never answer the statement.
    pub fn hanging() -> Self {
        Self {
            hang_on_query: true,
            ..Self::default()
        }
    }

    /// Fail the row stream after the rows already scripted.
    pub fn then_fail(mut self, message: &str) -> Self {
        self.rows.push(Err(QueryError::new(message)));
        self
    }

    /// Stall after the scripted rows instead of ending the result set.
    pub fn then_hang(mut self) -> Self {
        self.hang_after_rows = true;
        self
    }
}

#[derive(Debug, Default)]
struct Stats {
    queries: Mutex<Vec<String>>,
    executed: Mutex<Vec<String>>,
    rows_read: AtomicUsize,
    releases: AtomicUsize,
}

/// Fake database handle.
#[derive(Debug, Clone)]
pub struct FakeExecutor {
    scripts: HashMap<&'static str, Script>,
    fallback: Script,
    version: Result<ServerVersion, QueryError>,
    execute_error: Option<QueryError>,
    stats: Arc<Stats>,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeExecutor {
    /// Reports version 8.0 and answers every statement with no rows.
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            fallback: Script::default(),
            version: Ok(ServerVersion::new(8, 0)),
            execute_error: None,
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn with_version(mut self, version: ServerVersion) -> Self {
        self.version = Ok(version);
        self
    }

    pub fn with_version_error(mut self, message: &str) -> Self {
        self.version = Err(QueryError::new(message));
        self
    }

    pub fn with_execute_error(mut self, message: &str) -> Self {
        self.execute_error = Some(QueryError::new(message));
        self
    }

    /// Script used for statements without their own script.
    pub fn with_fallback(mut self, script: Script) -> Self {
        self.fallback = script;
        self
    }

    pub fn with_script(mut self, sql: &ReadOnlySql, script: Script) -> Self {
        self.scripts.insert(sql.as_str(), script);
        self
    }

    /// Read-only statements issued so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.stats.queries.lock().unwrap().clone()
    }

    /// Maintenance statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.stats.executed.lock().unwrap().clone()
    }

    /// Row fetches answered, including fetches that returned an error.
    pub fn rows_read(&self) -> usize {
        self.stats.rows_read.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.stats.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn query<'a>(
        &'a self,
        sql: &'a ReadOnlySql,
    ) -> Result<Box<dyn RowCursor + 'a>, QueryError> {
        self.stats.queries.lock().unwrap().push(sql.as_str().to_string());

        let script = self.scripts.get(sql.as_str()).unwrap_or(&self.fallback);
        if script.hang_on_query {
            std::future::pending::<()>().await;
        }
        if let Some(err) = &script.query_error {
            return Err(err.clone());
        }

        Ok(Box::new(FakeCursor {
            rows: script.rows.iter().cloned().collect(),
            hang_after_rows: script.hang_after_rows,
            stats: Arc::clone(&self.stats),
        }))
    }

    async fn execute(&self, sql: &MaintenanceSql) -> Result<u64, QueryError> {
        if let Some(err) = &self.execute_error {
            return Err(err.clone());
        }
        self.stats.executed.lock().unwrap().push(sql.as_str().to_string());
        Ok(0)
    }

    async fn server_version(&self) -> Result<ServerVersion, QueryError> {
        self.version.clone()
    }
}

struct FakeCursor {
    rows: VecDeque<Result<Row, QueryError>>,
    hang_after_rows: bool,
    stats: Arc<Stats>,
}

#[async_trait]
impl RowCursor for FakeCursor {
    async fn next_row(&mut self) -> Result<Option<Row>, QueryError> {
        match self.rows.pop_front() {
            Some(row) => {
                self.stats.rows_read.fetch_add(1, Ordering::SeqCst);
                row.map(Some)
            }
            None if self.hang_after_rows => std::future::pending().await,
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}
