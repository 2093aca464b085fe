//! Metrics module.
//!
//! The delivery pipeline emits fire-and-forget counter and gauge events into
//! a [`MetricsCollector`]; [`PrometheusExporter`] renders them for `/metrics`.
//!
//! # Example
//!
//! ```ignore
//! use alert_relay::metrics::{MetricsCollector, PrometheusExporter};
//!
//! let collector = Arc::new(MetricsCollector::new());
//! collector.record_telegram_attempt("prod", "critical", "sre");
//!
//! let text = PrometheusExporter::new(collector).export();
//! ```

mod collector;
mod prometheus;

pub use collector::{Metric, MetricsCollector, MetricsSnapshot, Sample};
pub use prometheus::PrometheusExporter;
