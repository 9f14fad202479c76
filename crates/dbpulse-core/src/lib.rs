//! dbpulse-core — the scraper contract and its execution model.
//!
//! Every collector is a [`Scraper`]: it runs one fixed, read-only statement
//! against a [`QueryExecutor`], decodes each returned row and emits one
//! [`MetricSample`] per row into a [`MetricSink`]. The
//! [`ScrapeOrchestrator`] runs every scraper the connected server is new
//! enough for, concurrently, and reports per-collector outcomes.
//!
//! # Architecture
//!
//! ```text
//! ScrapeOrchestrator
//!   ├── CollectorSet (name → Arc<dyn Scraper>, built once at startup)
//!   ├── version gating: min_version() > server → Skipped, never scraped
//!   └── per eligible scraper, one task:
//!       Scraper::scrape(ctx, db, sink)
//!         ├── db.query(ReadOnlySql)   ← cancellable via ScrapeContext
//!         ├── cursor.next_row()       ← cancellable, one row at a time
//!         ├── decode → MetricSample   ← DecodeError aborts, no rollback
//!         └── sink.emit(sample)       ← row order, cancellable
//! ```
//!
//! Descriptors are built once into [`Descriptors`] and shared read-only.
//! Destructive maintenance (truncating statement summaries) lives in
//! [`maintenance`] and needs a [`TruncateAuthorization`].

pub mod context;
pub mod error;
pub mod maintenance;
pub mod metric;
pub mod orchestrator;
pub mod registry;
pub mod scraper;
pub mod scrapers;
pub mod sink;
pub mod source;
pub mod version;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use context::ScrapeContext;
pub use error::{
    CancelReason, CollectorSetError, DecodeError, LabelMismatch, QueryError, ScrapeError,
    ScrapeResult,
};
pub use maintenance::{TruncateAuthorization, truncate_statement_summary};
pub use metric::{MetricDesc, MetricKind, MetricSample};
pub use orchestrator::{CollectorReport, MetaDescriptors, Outcome, ScrapeOrchestrator, ScrapeReport};
pub use registry::CollectorSet;
pub use scraper::Scraper;
pub use scrapers::Descriptors;
pub use sink::MetricSink;
pub use source::{MaintenanceSql, QueryExecutor, ReadOnlySql, Row, RowCursor, Value};
pub use version::ServerVersion;
