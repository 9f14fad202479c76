//! The concrete collectors, one per diagnostic query.
//!
//! | collector | source | kind |
//! |---|---|---|
//! | `global_status_request_rate` | `information_schema.global_status` | counter |
//! | `global_status_saturation` | `information_schema.global_status` | gauge |
//! | `global_status_utilization` | `information_schema.global_status` | gauge |
//! | `perf_schema_query_error_rate` | `performance_schema` statement summary by user | counter |
//! | `perf_schema_query_latency` | `performance_schema` global statement summary | gauge |

pub mod info_schema;
pub mod perf_schema;

use std::sync::Arc;

use crate::metric::MetricDesc;
use crate::scraper::Scraper;

pub use info_schema::{GlobalStatusRequestRate, GlobalStatusSaturation, GlobalStatusUtilization};
pub use perf_schema::{PerfSchemaQueryErrorRate, PerfSchemaQueryLatency};

/// Descriptors for every collector's metric.
///
/// Built once at startup; collectors keep an `Arc` to their own entry.
#[derive(Debug, Clone)]
pub struct Descriptors {
    pub request_rate: Arc<MetricDesc>,
    pub saturation: Arc<MetricDesc>,
    pub utilization: Arc<MetricDesc>,
    pub query_errors: Arc<MetricDesc>,
    pub query_latency: Arc<MetricDesc>,
}

impl Descriptors {
    pub fn new() -> Self {
        Self {
            request_rate: Arc::new(GlobalStatusRequestRate::describe()),
            saturation: Arc::new(GlobalStatusSaturation::describe()),
            utilization: Arc::new(GlobalStatusUtilization::describe()),
            query_errors: Arc::new(PerfSchemaQueryErrorRate::describe()),
            query_latency: Arc::new(PerfSchemaQueryLatency::describe()),
        }
    }
}

impl Default for Descriptors {
    fn default() -> Self {
        Self::new()
    }
}

/// Every available collector, in registration order.
pub fn all(descriptors: &Descriptors) -> Vec<Arc<dyn Scraper>> {
    vec![
        Arc::new(GlobalStatusRequestRate::new(descriptors)),
        Arc::new(GlobalStatusSaturation::new(descriptors)),
        Arc::new(GlobalStatusUtilization::new(descriptors)),
        Arc::new(PerfSchemaQueryErrorRate::new(descriptors)),
        Arc::new(PerfSchemaQueryLatency::new(descriptors)),
    ]
}
