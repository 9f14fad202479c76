//! Prometheus text exposition format.
//!
//! Renders one scrape cycle's samples for a Prometheus server or compatible
//! agent. Families appear in descriptor order; samples within a family keep
//! emission order.

use std::fmt::Write as _;
use std::sync::Arc;

use dbpulse_core::{MetricDesc, MetricSample};

/// Content type of the text exposition format, version 0.0.4.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render samples grouped under their descriptors.
///
/// Every descriptor gets its `# HELP`/`# TYPE` header even without samples.
/// Samples whose descriptor was not passed in are rendered after the known
/// families, in the order their descriptors first appear.
pub fn render_prometheus(descriptors: &[Arc<MetricDesc>], samples: &[MetricSample]) -> String {
    let mut families: Vec<&Arc<MetricDesc>> = descriptors.iter().collect();
    for sample in samples {
        let name = sample.desc().fq_name();
        if !families.iter().any(|d| d.fq_name() == name) {
            families.push(sample.desc());
        }
    }

    let mut out = String::new();
    for desc in families {
        write_header(&mut out, desc);
        for sample in samples.iter().filter(|s| s.desc().fq_name() == desc.fq_name()) {
            write_sample(&mut out, sample);
        }
    }
    out
}

fn write_header(out: &mut String, desc: &MetricDesc) {
    let _ = writeln!(out, "# HELP {} {}", desc.fq_name(), escape_help(desc.help()));
    let _ = writeln!(out, "# TYPE {} {}", desc.fq_name(), desc.kind());
}

fn write_sample(out: &mut String, sample: &MetricSample) {
    out.push_str(sample.desc().fq_name());

    let mut labels = sample.labels().peekable();
    if labels.peek().is_some() {
        out.push('{');
        for (i, (name, value)) in labels.enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{name}=\"{}\"", escape_label_value(value));
        }
        out.push('}');
    }

    out.push(' ');
    out.push_str(&format_value(sample.value()));
    out.push('\n');
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        // Display drops the fraction of integral values.
        value.to_string()
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', r"\\").replace('\n', r"\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', "\\\"")
        .replace('\n', r"\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbpulse_core::{Descriptors, MetaDescriptors, MetricKind};

    fn labelled(name: &str) -> Arc<MetricDesc> {
        Arc::new(MetricDesc::new(name, "Labelled gauge.", MetricKind::Gauge, &["collector"]))
    }

    #[test]
    fn render_empty_keeps_headers() {
        let d = Descriptors::new();
        let output = render_prometheus(&[Arc::clone(&d.request_rate)], &[]);
        assert_eq!(
            output,
            format!(
                "# HELP mysql_info_schema_global_status_request_rate {}\n\
                 # TYPE mysql_info_schema_global_status_request_rate counter\n",
                d.request_rate.help()
            )
        );
    }

    #[test]
    fn render_counter_and_gauge() {
        let d = Descriptors::new();
        let samples = vec![
            MetricSample::new(&d.query_latency, 0.25),
            MetricSample::new(&d.request_rate, 42.0),
        ];
        let output = render_prometheus(&[Arc::clone(&d.request_rate), Arc::clone(&d.query_latency)], &samples);

        let lines: Vec<&str> = output.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(
            lines,
            vec![
                "mysql_info_schema_global_status_request_rate 42",
                "mysql_perf_schema_events_statements_select_avg_latency_ms 0.25",
            ]
        );
        assert!(output.contains("# TYPE mysql_info_schema_global_status_request_rate counter\n"));
        assert!(output.contains("# TYPE mysql_perf_schema_events_statements_select_avg_latency_ms gauge\n"));
    }

    #[test]
    fn samples_keep_emission_order() {
        let d = Descriptors::new();
        let samples: Vec<_> = [3.0, 1.0, 2.0]
            .into_iter()
            .map(|v| MetricSample::new(&d.saturation, v))
            .collect();
        let output = render_prometheus(&[Arc::clone(&d.saturation)], &samples);

        let values: Vec<&str> = output
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(|l| l.rsplit(' ').next().unwrap())
            .collect();
        assert_eq!(values, vec!["3", "1", "2"]);
    }

    #[test]
    fn labels_are_escaped() {
        let desc = labelled("mysql_exporter_collector_success");
        let sample = MetricSample::with_labels(&desc, 1.0, ["a\"b\\c\nd"]).unwrap();
        let output = render_prometheus(&[Arc::clone(&desc)], &[sample]);
        assert!(output.contains(r#"mysql_exporter_collector_success{collector="a\"b\\c\nd"} 1"#));
    }

    #[test]
    fn help_is_escaped() {
        let desc = Arc::new(MetricDesc::new("mysql_x", "line one\nback\\slash", MetricKind::Gauge, &[]));
        let output = render_prometheus(&[desc], &[]);
        assert!(output.starts_with("# HELP mysql_x line one\\nback\\\\slash\n"));
    }

    #[test]
    fn special_values_are_spelled_out() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(-2.5), "-2.5");
        assert_eq!(format_value(18_446_744_073_709_551_615.0), "18446744073709552000");
    }

    #[test]
    fn unregistered_families_follow_known_ones() {
        let d = Descriptors::new();
        let meta = MetaDescriptors::new();
        let samples = vec![
            MetricSample::new(&meta.up, 1.0),
            MetricSample::new(&d.utilization, 7.0),
        ];
        let output = render_prometheus(&[Arc::clone(&d.utilization)], &samples);

        let utilization = output.find("# HELP mysql_info_schema_global_status_utilization").unwrap();
        let up = output.find("# HELP mysql_up").unwrap();
        assert!(utilization < up);
        assert!(output.ends_with("mysql_up 1\n"));
    }

    #[test]
    fn every_sample_line_is_name_then_value() {
        let meta = MetaDescriptors::new();
        let samples = vec![
            MetricSample::new(&meta.up, 0.0),
            MetricSample::with_labels(&meta.collector_duration, 0.125, ["global_status_saturation"]).unwrap(),
        ];
        let output = render_prometheus(&meta.all(), &samples);

        for line in output.lines().filter(|l| !l.starts_with('#')) {
            let (series, value) = line.rsplit_once(' ').unwrap();
            assert!(series.starts_with("mysql_"), "bad series: {line}");
            assert!(value.parse::<f64>().is_ok(), "bad value: {line}");
        }
    }
}
