//! The scraper contract and the row loop every scraper shares.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::context::ScrapeContext;
use crate::error::{DecodeError, ScrapeError};
use crate::metric::{MetricDesc, MetricSample};
use crate::sink::MetricSink;
use crate::source::{QueryExecutor, ReadOnlySql, Row, RowCursor};
use crate::version::ServerVersion;

/// A collector that turns one diagnostic query into metric samples.
///
/// Implementations hold no mutable state: the same instance may be scraped
/// concurrently from several tasks.
#[async_trait]
pub trait Scraper: Send + Sync + 'static {
    /// Stable unique identifier, used for enable lists and logging.
    fn name(&self) -> &'static str;

    /// What the collector measures.
    fn help(&self) -> &'static str;

    /// Oldest server version the statement is known to work on.
    fn min_version(&self) -> ServerVersion;

    /// Descriptor of the metric this scraper emits.
    fn descriptor(&self) -> &Arc<MetricDesc>;

    /// The statement issued by [`scrape`](Self::scrape).
    fn statement(&self) -> &ReadOnlySql;

    /// Run the statement and emit one sample per row, in row order.
    ///
    /// # Errors
    ///
    /// - `ScrapeError::Query` if the statement or the row stream fails
    /// - `ScrapeError::Decode` if a row has the wrong shape; earlier samples
    ///   stay emitted
    /// - `ScrapeError::Cancelled` if the context ends first
    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        db: &dyn QueryExecutor,
        sink: &MetricSink,
    ) -> Result<(), ScrapeError>;
}

/// Releases the wrapped cursor when dropped, so every exit path (including
/// the scrape future itself being dropped) gives it back exactly once.
struct CursorGuard<'a> {
    cursor: Box<dyn RowCursor + 'a>,
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        self.cursor.release();
    }
}

/// Query, decode and emit loop shared by every scraper.
///
/// `decode` maps one row to one sample. Returns the number of samples
/// emitted.
pub async fn scrape_rows<F>(
    ctx: &ScrapeContext,
    db: &dyn QueryExecutor,
    sql: &ReadOnlySql,
    sink: &MetricSink,
    mut decode: F,
) -> Result<usize, ScrapeError>
where
    F: FnMut(&Row) -> Result<MetricSample, DecodeError> + Send,
{
    let cursor = ctx.run(db.query(sql)).await??;
    let mut guard = CursorGuard { cursor };

    let mut emitted = 0;
    while let Some(row) = ctx.run(guard.cursor.next_row()).await?? {
        let sample = decode(&row)?;
        sink.emit(ctx, sample).await?;
        emitted += 1;
    }

    debug!(rows = emitted, "result set drained");
    Ok(emitted)
}
