//! Scrape orchestrator: runs every eligible collector for one scrape cycle.
//!
//! Each eligible scraper runs in its own Tokio task on a child of the cycle's
//! context, with its own counted handle on the shared sink. A failing scraper
//! only fails itself; the report records what happened to each one. Dropping
//! a cycle before it finishes cancels the child context, so no task outlives
//! its caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::context::ScrapeContext;
use crate::error::ScrapeError;
use crate::metric::{MetricDesc, MetricKind, MetricSample, NAMESPACE, build_fq_name};
use crate::registry::CollectorSet;
use crate::sink::{self, MetricSink};
use crate::source::QueryExecutor;
use crate::version::ServerVersion;

/// What happened to one collector during a scrape cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded { samples: usize },
    /// Samples emitted before the failure stay emitted.
    Failed { error: ScrapeError, samples: usize },
    /// The server is older than the collector's minimum version.
    Skipped { required: ServerVersion },
    /// The collector's task panicked or was aborted.
    Aborted { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorReport {
    pub name: &'static str,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl CollectorReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded { .. })
    }

    /// Whether the collector ran and did not succeed.
    pub fn failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. } | Outcome::Aborted { .. })
    }
}

/// Per-collector results of one scrape cycle, in registration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScrapeReport {
    /// `None` when the server could not be reached.
    pub server_version: Option<ServerVersion>,
    pub collectors: Vec<CollectorReport>,
}

impl ScrapeReport {
    /// Report for a cycle where the server version could not be read.
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn up(&self) -> bool {
        self.server_version.is_some()
    }

    pub fn get(&self, name: &str) -> Option<&CollectorReport> {
        self.collectors.iter().find(|c| c.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CollectorReport> {
        self.collectors.iter().filter(|c| c.failed())
    }

    /// Exporter self-metrics for this cycle.
    ///
    /// Skipped collectors get no per-collector samples.
    pub fn meta_samples(&self, meta: &MetaDescriptors) -> Vec<MetricSample> {
        let mut samples = vec![MetricSample::new(&meta.up, if self.up() { 1.0 } else { 0.0 })];

        for report in &self.collectors {
            if matches!(report.outcome, Outcome::Skipped { .. }) {
                continue;
            }
            let success = if report.succeeded() { 1.0 } else { 0.0 };
            // Arity is fixed by MetaDescriptors::new.
            if let Ok(sample) = MetricSample::with_labels(&meta.collector_success, success, [report.name]) {
                samples.push(sample);
            }
            if let Ok(sample) = MetricSample::with_labels(
                &meta.collector_duration,
                report.duration.as_secs_f64(),
                [report.name],
            ) {
                samples.push(sample);
            }
        }

        samples
    }
}

/// Descriptors of the exporter's own metrics.
#[derive(Debug, Clone)]
pub struct MetaDescriptors {
    pub up: Arc<MetricDesc>,
    pub collector_success: Arc<MetricDesc>,
    pub collector_duration: Arc<MetricDesc>,
}

impl MetaDescriptors {
    pub fn new() -> Self {
        Self {
            up: Arc::new(MetricDesc::new(
                build_fq_name(NAMESPACE, "", "up"),
                "Whether the MySQL server is up.",
                MetricKind::Gauge,
                &[],
            )),
            collector_success: Arc::new(MetricDesc::new(
                build_fq_name(NAMESPACE, "exporter", "collector_success"),
                "Whether the collector succeeded during the last scrape.",
                MetricKind::Gauge,
                &["collector"],
            )),
            collector_duration: Arc::new(MetricDesc::new(
                build_fq_name(NAMESPACE, "exporter", "collector_duration_seconds"),
                "Collector time duration of the last scrape.",
                MetricKind::Gauge,
                &["collector"],
            )),
        }
    }

    pub fn all(&self) -> Vec<Arc<MetricDesc>> {
        vec![
            Arc::clone(&self.up),
            Arc::clone(&self.collector_success),
            Arc::clone(&self.collector_duration),
        ]
    }
}

impl Default for MetaDescriptors {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a collector set against one server.
#[derive(Debug, Clone)]
pub struct ScrapeOrchestrator {
    collectors: Arc<CollectorSet>,
}

impl ScrapeOrchestrator {
    pub fn new(collectors: Arc<CollectorSet>) -> Self {
        Self { collectors }
    }

    /// Run every eligible collector concurrently, emitting into `sink`.
    ///
    /// Collectors whose `min_version` is above `version` are skipped without
    /// being invoked. Returns once every spawned collector has finished.
    /// If the returned future is dropped first, the spawned collectors are
    /// cancelled.
    pub async fn run(
        &self,
        ctx: &ScrapeContext,
        db: Arc<dyn QueryExecutor>,
        version: ServerVersion,
        sink: &MetricSink,
    ) -> ScrapeReport {
        let mut slots: Vec<Option<CollectorReport>> = vec![None; self.collectors.len()];
        let mut tasks = Vec::new();

        let cycle = ctx.child();
        let _cancel_on_drop = cycle.token().clone().drop_guard();

        for (idx, scraper) in self.collectors.iter().enumerate() {
            let name = scraper.name();
            let required = scraper.min_version();
            if required > version {
                debug!(
                    collector = name,
                    %required,
                    server = %version,
                    "collector skipped for server version"
                );
                slots[idx] = Some(CollectorReport {
                    name,
                    outcome: Outcome::Skipped { required },
                    duration: Duration::ZERO,
                });
                continue;
            }

            let scraper = Arc::clone(scraper);
            let db = Arc::clone(&db);
            let ctx = cycle.clone();
            let sink = sink.counted();
            let handle = tokio::spawn(async move {
                let start = Instant::now();
                let result = scraper.scrape(&ctx, db.as_ref(), &sink).await;
                (result, sink.emitted(), start.elapsed())
            });
            tasks.push((idx, name, handle));
        }

        for (idx, name, handle) in tasks {
            let report = match handle.await {
                Ok((Ok(()), samples, duration)) => {
                    debug!(collector = name, samples, ?duration, "collector succeeded");
                    CollectorReport {
                        name,
                        outcome: Outcome::Succeeded { samples },
                        duration,
                    }
                }
                Ok((Err(error), samples, duration)) => {
                    warn!(collector = name, %error, samples, "collector failed");
                    CollectorReport {
                        name,
                        outcome: Outcome::Failed { error, samples },
                        duration,
                    }
                }
                Err(e) => {
                    warn!(collector = name, error = %e, "collector task aborted");
                    CollectorReport {
                        name,
                        outcome: Outcome::Aborted {
                            reason: e.to_string(),
                        },
                        duration: Duration::ZERO,
                    }
                }
            };
            slots[idx] = Some(report);
        }

        ScrapeReport {
            server_version: Some(version),
            collectors: slots.into_iter().flatten().collect(),
        }
    }

    /// Run one cycle into an internal channel and return what was emitted.
    ///
    /// Samples from different collectors interleave; each collector's own
    /// samples keep row order.
    pub async fn collect(
        &self,
        ctx: &ScrapeContext,
        db: Arc<dyn QueryExecutor>,
        version: ServerVersion,
        capacity: usize,
    ) -> (Vec<MetricSample>, ScrapeReport) {
        let (sink, mut rx) = sink::channel(capacity);

        let run = async move {
            let report = self.run(ctx, db, version, &sink).await;
            drop(sink);
            report
        };
        let drain = async {
            let mut samples = Vec::new();
            while let Some(sample) = rx.recv().await {
                samples.push(sample);
            }
            samples
        };

        let (report, samples) = tokio::join!(run, drain);
        (samples, report)
    }
}
