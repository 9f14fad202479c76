//! Error types for scraping and collector-set construction.

use std::fmt;

use thiserror::Error;

/// Result type alias for scrape operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Why a scrape stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The context's token was cancelled.
    Cancelled,
    /// The context's deadline elapsed.
    DeadlineExceeded,
    /// The consumer of the sample stream went away.
    ReceiverDropped,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
            CancelReason::ReceiverDropped => write!(f, "sample receiver dropped"),
        }
    }
}

/// A statement failed to execute or its result stream broke mid-way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query failed: {message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A row did not have the shape or types a scraper declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("row has {found} columns, column {column} requested")]
    MissingColumn { column: usize, found: usize },

    #[error("column {column} is NULL")]
    Null { column: usize },

    #[error("column {column}: cannot decode {value:?} as {target}")]
    Type {
        column: usize,
        target: &'static str,
        value: String,
    },
}

/// Terminal failure of a single scrape call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("scrape cancelled: {0}")]
    Cancelled(CancelReason),
}

impl ScrapeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScrapeError::Cancelled(_))
    }
}

impl From<CancelReason> for ScrapeError {
    fn from(reason: CancelReason) -> Self {
        ScrapeError::Cancelled(reason)
    }
}

/// Label values did not match a descriptor's label names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("metric {metric} expects {expected} label values, got {found}")]
pub struct LabelMismatch {
    pub metric: String,
    pub expected: usize,
    pub found: usize,
}

/// Configuration errors detected while building a collector set.
///
/// All of these are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorSetError {
    #[error("collector name must not be empty")]
    EmptyName,

    #[error("duplicate collector name: {0}")]
    DuplicateName(String),

    #[error("duplicate metric descriptor: {0}")]
    DuplicateDescriptor(String),

    #[error("collector {name} issues a statement that is not read-only: {reason}")]
    NotReadOnly { name: String, reason: String },

    #[error("unknown collector: {0}")]
    UnknownCollector(String),
}
