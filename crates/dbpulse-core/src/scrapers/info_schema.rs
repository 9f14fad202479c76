//! Collectors over `information_schema.global_status`.
//!
//! `variable_value` is a `VARCHAR`, so every value arrives as text (or as a
//! `DOUBLE` once summed) and is decoded as an unsigned count.

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

const SUBSYSTEM: &str = "info_schema";

const MIN_VERSION: ServerVersion = ServerVersion::new(5, 1);

pub const REQUEST_RATE_QUERY: ReadOnlySql = ReadOnlySql::new(
    r"
    SELECT SUM(variable_value) AS total_request_rate
      FROM information_schema.global_status
     WHERE variable_name IN ('com_select', 'com_update', 'com_delete', 'com_insert')
    ",
);

pub const SATURATION_QUERY: ReadOnlySql = ReadOnlySql::new(
    r"
    SELECT SUM(variable_value) AS threads_running
      FROM information_schema.global_status
     WHERE variable_name = 'THREADS_RUNNING'
    ",
);

pub const UTILIZATION_QUERY: ReadOnlySql = ReadOnlySql::new(
    r"
    SELECT variable_value AS innodb_rows_read
      FROM information_schema.global_status
     WHERE variable_name = 'INNODB_ROWS_READ'
    ",
);

/// Sum of `Com_select`, `Com_update`, `Com_delete` and `Com_insert`.
#[derive(Debug, Clone)]
pub struct GlobalStatusRequestRate {
    desc: Arc<MetricDesc>,
}

impl GlobalStatusRequestRate {
    pub const NAME: &'static str = "global_status_request_rate";

    pub fn new(descriptors: &Descriptors) -> Self {
        Self {
            desc: Arc::clone(&descriptors.request_rate),
        }
    }

    pub(crate) fn describe() -> MetricDesc {
        MetricDesc::new(
            build_fq_name(NAMESPACE, SUBSYSTEM, "global_status_request_rate"),
            "The total count of requests.",
            MetricKind::Counter,
            &[],
        )
    }
}

#[async_trait]
impl Scraper for GlobalStatusRequestRate {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn help(&self) -> &'static str {
        "Returns request rate from information_schema.global_status"
    }

    fn min_version(&self) -> ServerVersion {
        MIN_VERSION
    }

    fn descriptor(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    fn statement(&self) -> &ReadOnlySql {
        &REQUEST_RATE_QUERY
    }

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        db: &dyn QueryExecutor,
        sink: &MetricSink,
    ) -> Result<(), ScrapeError> {
        scrape_rows(ctx, db, &REQUEST_RATE_QUERY, sink, |row| {
            Ok(MetricSample::new(&self.desc, row.get_u64(0)? as f64))
        })
        .await?;
        Ok(())
    }
}

/// Running threads.
#[derive(Debug, Clone)]
pub struct GlobalStatusSaturation {
    desc: Arc<MetricDesc>,
}

impl GlobalStatusSaturation {
    pub const NAME: &'static str = "global_status_saturation";

    pub fn new(descriptors: &Descriptors) -> Self {
        Self {
            desc: Arc::clone(&descriptors.saturation),
        }
    }

    pub(crate) fn describe() -> MetricDesc {
        MetricDesc::new(
            build_fq_name(NAMESPACE, SUBSYSTEM, "global_status_saturation"),
            "Saturation rate.",
            MetricKind::Gauge,
            &[],
        )
    }
}

#[async_trait]
impl Scraper for GlobalStatusSaturation {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn help(&self) -> &'static str {
        "Returns saturation rate from information_schema.global_status"
    }

    fn min_version(&self) -> ServerVersion {
        MIN_VERSION
    }

    fn descriptor(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    fn statement(&self) -> &ReadOnlySql {
        &SATURATION_QUERY
    }

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        db: &dyn QueryExecutor,
        sink: &MetricSink,
    ) -> Result<(), ScrapeError> {
        scrape_rows(ctx, db, &SATURATION_QUERY, sink, |row| {
            Ok(MetricSample::new(&self.desc, row.get_u64(0)? as f64))
        })
        .await?;
        Ok(())
    }
}

/// InnoDB rows read.
#[derive(Debug, Clone)]
pub struct GlobalStatusUtilization {
    desc: Arc<MetricDesc>,
}

impl GlobalStatusUtilization {
    pub const NAME: &'static str = "global_status_utilization";

    pub fn new(descriptors: &Descriptors) -> Self {
        Self {
            desc: Arc::clone(&descriptors.utilization),
        }
    }

    pub(crate) fn describe() -> MetricDesc {
        MetricDesc::new(
            build_fq_name(NAMESPACE, SUBSYSTEM, "global_status_utilization"),
            "Utilization rate.",
            MetricKind::Gauge,
            &[],
        )
    }
}

#[async_trait]
impl Scraper for GlobalStatusUtilization {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn help(&self) -> &'static str {
        "Returns utilization rate from information_schema.global_status"
    }

    fn min_version(&self) -> ServerVersion {
        MIN_VERSION
    }

    fn descriptor(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    fn statement(&self) -> &ReadOnlySql {
        &UTILIZATION_QUERY
    }

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        db: &dyn QueryExecutor,
        sink: &MetricSink,
    ) -> Result<(), ScrapeError> {
        scrape_rows(ctx, db, &UTILIZATION_QUERY, sink, |row| {
            Ok(MetricSample::new(&self.desc, row.get_u64(0)? as f64))
        })
        .await?;
        Ok(())
    }
}
