//! Prometheus metrics exporter.
//!
//! Exports metrics in Prometheus text format.

use std::sync::Arc;

use super::collector::{Metric, MetricsCollector};

/// Prometheus metrics exporter.
pub struct PrometheusExporter {
    collector: Arc<MetricsCollector>,
    namespace: String,
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter.
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self::with_namespace(collector, "alertbot")
    }

    /// Create a new Prometheus exporter with custom namespace.
    pub fn with_namespace(collector: Arc<MetricsCollector>, namespace: impl Into<String>) -> Self {
        Self {
            collector,
            namespace: namespace.into(),
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let snapshot = self.collector.snapshot();
        let mut output = String::new();

        for metric in Metric::ALL {
            if metric == Metric::ConfigReloadFailures {
                self.write_header(&mut output, metric);
                output.push_str(&format!(
                    "{} {}\n",
                    self.full_name(metric),
                    snapshot.config_reload_failures
                ));
                continue;
            }

            let Some(samples) = snapshot.series.get(&metric) else {
                continue;
            };

            self.write_header(&mut output, metric);
            for sample in samples {
                let labels_str = metric
                    .label_names()
                    .iter()
                    .zip(&sample.labels)
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                output.push_str(&format!(
                    "{}{{{}}} {}\n",
                    self.full_name(metric),
                    labels_str,
                    sample.value
                ));
            }
        }

        output
    }

    fn full_name(&self, metric: Metric) -> String {
        let suffix = if metric.is_gauge() { "" } else { "_total" };
        format!("{}_{}{}", self.namespace, metric.name(), suffix)
    }

    fn write_header(&self, output: &mut String, metric: Metric) {
        let full_name = self.full_name(metric);
        let kind = if metric.is_gauge() { "gauge" } else { "counter" };
        output.push_str(&format!("# HELP {} {}\n", full_name, metric.help()));
        output.push_str(&format!("# TYPE {} {}\n", full_name, kind));
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
