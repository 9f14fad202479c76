//! Database boundary: statements, rows, and the executor/cursor traits.
//!
//! The core never talks to a driver directly. An adapter (see
//! `dbpulse-mysql`) implements [`QueryExecutor`] and hands back a
//! [`RowCursor`] that yields one [`Row`] at a time.

use async_trait::async_trait;

use crate::error::{DecodeError, QueryError};
use crate::version::ServerVersion;

/// A single column value as delivered by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

/// One row of a result set, columns in `SELECT` order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: usize) -> Result<&Value, DecodeError> {
        self.values.get(column).ok_or(DecodeError::MissingColumn {
            column,
            found: self.values.len(),
        })
    }

    /// Decode an unsigned count.
    ///
    /// Integral floats and numeric text (`SUM` over a `VARCHAR` or `DECIMAL`
    /// column) are accepted; negatives, fractions and `NULL` are not.
    pub fn get_u64(&self, column: usize) -> Result<u64, DecodeError> {
        let mismatch = |value: String| DecodeError::Type {
            column,
            target: "u64",
            value,
        };

        match self.get(column)? {
            Value::Null => Err(DecodeError::Null { column }),
            Value::UInt(v) => Ok(*v),
            Value::Int(v) => u64::try_from(*v).map_err(|_| mismatch(v.to_string())),
            Value::Float(v) => float_to_u64(*v).ok_or_else(|| mismatch(v.to_string())),
            Value::Text(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(float_to_u64))
                    .ok_or_else(|| mismatch(s.to_string()))
            }
        }
    }

    /// Decode a floating-point value.
    pub fn get_f64(&self, column: usize) -> Result<f64, DecodeError> {
        match self.get(column)? {
            Value::Null => Err(DecodeError::Null { column }),
            Value::UInt(v) => Ok(*v as f64),
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            Value::Text(s) => s.trim().parse::<f64>().map_err(|_| DecodeError::Type {
                column,
                target: "f64",
                value: s.clone(),
            }),
        }
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

fn float_to_u64(v: f64) -> Option<u64> {
    // 2^64 is exactly representable; anything at or above it overflows.
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < 18_446_744_073_709_551_616.0)
        .then_some(v as u64)
}

/// A fixed statement that reads and never writes.
///
/// Scrapers can only hold one of these; [`validate`](Self::validate) is
/// enforced when a collector set is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOnlySql(&'static str);

impl ReadOnlySql {
    pub const fn new(sql: &'static str) -> Self {
        Self(sql)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Check that the text is exactly one `SELECT` statement that neither
    /// writes (`INTO OUTFILE`, `INTO @var`) nor takes row locks.
    pub fn validate(&self) -> Result<(), String> {
        let body = self.0.trim();
        let body = body.strip_suffix(';').unwrap_or(body).trim_end();

        if body.contains(';') {
            return Err("more than one statement".to_string());
        }

        match body.split_whitespace().next() {
            Some(keyword) if keyword.eq_ignore_ascii_case("SELECT") => {}
            Some(keyword) => return Err(format!("statement starts with {keyword}, expected SELECT")),
            None => return Err("empty statement".to_string()),
        }

        let words: Vec<String> = body
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .map(|w| w.to_ascii_uppercase())
            .collect();
        for pair in words.windows(2) {
            match (pair[0].as_str(), pair[1].as_str()) {
                ("FOR", "UPDATE" | "SHARE") | ("LOCK", "IN") => {
                    return Err(format!("statement takes row locks with {} {}", pair[0], pair[1]));
                }
                _ => {}
            }
        }
        if words.iter().any(|w| w == "INTO") {
            return Err("statement writes with INTO".to_string());
        }
        Ok(())
    }
}

/// A statement that mutates server state. Only [`crate::maintenance`]
/// constructs these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceSql(&'static str);

impl MaintenanceSql {
    pub(crate) const fn new(sql: &'static str) -> Self {
        Self(sql)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// Query execution capability supplied by the process around the core.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Issue a read-only statement and return a cursor over its rows.
    async fn query<'a>(
        &'a self,
        sql: &'a ReadOnlySql,
    ) -> Result<Box<dyn RowCursor + 'a>, QueryError>;

    /// Run a maintenance statement, returning the affected row count.
    async fn execute(&self, sql: &MaintenanceSql) -> Result<u64, QueryError>;

    /// Version of the connected server.
    async fn server_version(&self) -> Result<ServerVersion, QueryError>;
}

/// Forward-only row iterator over one result set.
#[async_trait]
pub trait RowCursor: Send {
    /// Next row, or `None` once the result set is exhausted.
    async fn next_row(&mut self) -> Result<Option<Row>, QueryError>;

    /// Give the result set back to the driver. Called exactly once.
    fn release(&mut self);
}
