//! Metric descriptors and samples.

use std::fmt;
use std::sync::Arc;

use crate::error::LabelMismatch;

/// Namespace prefix shared by every metric this exporter publishes.
pub const NAMESPACE: &str = "mysql";

/// Join non-empty name parts with `_`.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Kind of a metric as seen by the monitoring system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Monotonically increasing total.
    Counter,
    /// Point-in-time level.
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata for one metric: name, help, kind and label names.
///
/// Built once at startup and shared behind an `Arc` by every sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    fq_name: String,
    help: String,
    kind: MetricKind,
    label_names: Vec<String>,
}

impl MetricDesc {
    pub fn new(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        kind: MetricKind,
        label_names: &[&str],
    ) -> Self {
        Self {
            fq_name: fq_name.into(),
            help: help.into(),
            kind,
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
}

/// One observation of a described metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    desc: Arc<MetricDesc>,
    value: f64,
    label_values: Vec<String>,
}

impl MetricSample {
    /// Sample for a descriptor without labels.
    pub fn new(desc: &Arc<MetricDesc>, value: f64) -> Self {
        debug_assert!(
            desc.label_names.is_empty(),
            "{} has labels; use MetricSample::with_labels",
            desc.fq_name
        );
        Self {
            desc: Arc::clone(desc),
            value,
            label_values: Vec::new(),
        }
    }

    /// Sample carrying label values in the descriptor's label order.
    pub fn with_labels<I, S>(
        desc: &Arc<MetricDesc>,
        value: f64,
        label_values: I,
    ) -> Result<Self, LabelMismatch>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label_values: Vec<String> = label_values.into_iter().map(Into::into).collect();
        if label_values.len() != desc.label_names.len() {
            return Err(LabelMismatch {
                metric: desc.fq_name.clone(),
                expected: desc.label_names.len(),
                found: label_values.len(),
            });
        }
        Ok(Self {
            desc: Arc::clone(desc),
            value,
            label_values,
        })
    }

    pub fn desc(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    pub fn kind(&self) -> MetricKind {
        self.desc.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// `(name, value)` label pairs in descriptor order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.desc
            .label_names
            .iter()
            .map(String::as_str)
            .zip(self.label_values.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fq_name_skips_empty_parts() {
        assert_eq!(
            build_fq_name("mysql", "info_schema", "global_status_saturation"),
            "mysql_info_schema_global_status_saturation"
        );
        assert_eq!(build_fq_name("mysql", "", "up"), "mysql_up");
    }

    #[test]
    fn sample_takes_kind_from_descriptor() {
        let desc = Arc::new(MetricDesc::new("mysql_x", "x", MetricKind::Counter, &[]));
        let sample = MetricSample::new(&desc, 42.0);
        assert_eq!(sample.kind(), MetricKind::Counter);
        assert_eq!(sample.value(), 42.0);
        assert!(Arc::ptr_eq(sample.desc(), &desc));
    }

    #[test]
    fn labels_must_match_descriptor_arity() {
        let desc = Arc::new(MetricDesc::new(
            "mysql_exporter_collector_success",
            "ok",
            MetricKind::Gauge,
            &["collector"],
        ));

        let sample = MetricSample::with_labels(&desc, 1.0, ["latency"]).unwrap();
        assert_eq!(sample.labels().collect::<Vec<_>>(), vec![("collector", "latency")]);

        let err = MetricSample::with_labels(&desc, 1.0, Vec::<String>::new()).unwrap_err();
        assert_eq!(err.expected, 1);
        assert_eq!(err.found, 0);
    }
}
