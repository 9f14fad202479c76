//! Collectors over `performance_schema` statement summaries.
//!
//! Statement summary tables first shipped in 5.6. Timer columns are in
//! picoseconds; the latency statement divides by 1e9 so the value arrives in
//! milliseconds.
//!
//! Neither statement resets the summary table. Resetting is a separate,
//! authorized operation: [`crate::maintenance::truncate_statement_summary`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ScrapeContext;
use crate::error::ScrapeError;
use crate::metric::{MetricDesc, MetricKind, MetricSample, NAMESPACE, build_fq_name};
use crate::scraper::{Scraper, scrape_rows};
use crate::scrapers::Descriptors;
use crate::sink::MetricSink;
use crate::source::{QueryExecutor, ReadOnlySql};
use crate::version::ServerVersion;

const SUBSYSTEM: &str = "perf_schema";

const MIN_VERSION: ServerVersion = ServerVersion::new(5, 6);

pub const QUERY_ERRORS_QUERY: ReadOnlySql = ReadOnlySql::new(
    r"
    SELECT SUM(sum_errors) AS query_errors
      FROM performance_schema.events_statements_summary_by_user_by_event_name
     WHERE event_name IN ('statement/sql/select', 'statement/sql/insert',
                          'statement/sql/update', 'statement/sql/delete')
    ",
);

pub const QUERY_LATENCY_QUERY: ReadOnlySql = ReadOnlySql::new(
    r"
    SELECT avg_timer_wait / 1e9 AS avg_latency_ms
      FROM performance_schema.events_statements_summary_global_by_event_name
     WHERE event_name = 'statement/sql/select'
    ",
);

/// Errors raised by DML and `SELECT` statements, summed over all users.
#[derive(Debug, Clone)]
pub struct PerfSchemaQueryErrorRate {
    desc: Arc<MetricDesc>,
}

impl PerfSchemaQueryErrorRate {
    pub const NAME: &'static str = "perf_schema_query_error_rate";

    pub fn new(descriptors: &Descriptors) -> Self {
        Self {
            desc: Arc::clone(&descriptors.query_errors),
        }
    }

    pub(crate) fn describe() -> MetricDesc {
        MetricDesc::new(
            build_fq_name(NAMESPACE, SUBSYSTEM, "events_statements_errors"),
            "The total count of statement errors.",
            MetricKind::Counter,
            &[],
        )
    }
}

#[async_trait]
impl Scraper for PerfSchemaQueryErrorRate {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn help(&self) -> &'static str {
        "Returns error rate from performance_schema.events_statements_summary_by_user_by_event_name"
    }

    fn min_version(&self) -> ServerVersion {
        MIN_VERSION
    }

    fn descriptor(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    fn statement(&self) -> &ReadOnlySql {
        &QUERY_ERRORS_QUERY
    }

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        db: &dyn QueryExecutor,
        sink: &MetricSink,
    ) -> Result<(), ScrapeError> {
        scrape_rows(ctx, db, &QUERY_ERRORS_QUERY, sink, |row| {
            Ok(MetricSample::new(&self.desc, row.get_u64(0)? as f64))
        })
        .await?;
        Ok(())
    }
}

/// Average `SELECT` latency in milliseconds.
#[derive(Debug, Clone)]
pub struct PerfSchemaQueryLatency {
    desc: Arc<MetricDesc>,
}

impl PerfSchemaQueryLatency {
    pub const NAME: &'static str = "perf_schema_query_latency";

    pub fn new(descriptors: &Descriptors) -> Self {
        Self {
            desc: Arc::clone(&descriptors.query_latency),
        }
    }

    pub(crate) fn describe() -> MetricDesc {
        MetricDesc::new(
            build_fq_name(NAMESPACE, SUBSYSTEM, "events_statements_select_avg_latency_ms"),
            "Average latency of SELECT statements in milliseconds.",
            MetricKind::Gauge,
            &[],
        )
    }
}

#[async_trait]
impl Scraper for PerfSchemaQueryLatency {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn help(&self) -> &'static str {
        "Returns SELECT latency from performance_schema.events_statements_summary_global_by_event_name"
    }

    fn min_version(&self) -> ServerVersion {
        MIN_VERSION
    }

    fn descriptor(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    fn statement(&self) -> &ReadOnlySql {
        &QUERY_LATENCY_QUERY
    }

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        db: &dyn QueryExecutor,
        sink: &MetricSink,
    ) -> Result<(), ScrapeError> {
        scrape_rows(ctx, db, &QUERY_LATENCY_QUERY, sink, |row| {
            Ok(MetricSample::new(&self.desc, row.get_f64(0)?))
        })
        .await?;
        Ok(())
    }
}
