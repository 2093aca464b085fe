//! Channel message rendering.
//!
//! Four variants: telegram and SMS, each for Prometheus alert groups and for
//! Splunk alerts. The Prometheus variants also count rendered alerts.

mod sms;
mod telegram;
mod telegram_splunk;

use std::sync::Arc;

use chrono_tz::Tz;

pub use sms::{SmsBatch, suppression_notice};
pub use telegram::TelegramMessage;

use crate::domain::{AlertEvent, SplunkEvent};
use crate::error::RenderError;
use crate::metrics::MetricsCollector;

/// Cluster label used for Splunk-originated deliveries.
pub const SPLUNK_CLUSTER: &str = "splunk";
/// Severity label used for Splunk-originated telegram deliveries.
pub const SPLUNK_SEVERITY: &str = "NO_SEVERITY";

/// Builds channel text from inbound events.
pub struct MessageRenderer {
    timezone: Tz,
    splunk_public_host: String,
    metrics: Arc<MetricsCollector>,
}

impl MessageRenderer {
    pub fn new(
        timezone: Tz,
        splunk_public_host: impl Into<String>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            timezone,
            splunk_public_host: splunk_public_host.into(),
            metrics,
        }
    }

    /// Header plus one body per alert. Fails on a missing
    /// `commonLabels.severity` or any unrecognised status.
    pub fn telegram_prometheus(&self, event: &AlertEvent) -> Result<TelegramMessage, RenderError> {
        let message = telegram::render(event)?;

        let labels = GroupLabels::of(event);
        for _ in &event.alerts {
            self.metrics.record_telegram_rendered(
                &labels.status,
                &labels.alertname,
                &labels.cluster,
                &labels.severity,
            );
        }

        Ok(message)
    }

    /// Never fails; broken fields are replaced with a placeholder.
    pub fn telegram_splunk(&self, keys: &[String], event: &SplunkEvent) -> TelegramMessage {
        TelegramMessage {
            text: telegram_splunk::render(keys, event, &self.splunk_public_host),
            cluster: SPLUNK_CLUSTER.to_string(),
            severity: SPLUNK_SEVERITY.to_string(),
        }
    }

    pub fn sms_prometheus(&self, event: &AlertEvent) -> Result<SmsBatch, RenderError> {
        let batch = sms::render_prometheus(event, self.timezone)?;

        let labels = GroupLabels::of(event);
        for alert in &event.alerts {
            self.metrics.record_sms_rendered(
                &event.status,
                alert.label("alertname").unwrap_or(sms::NO_ALERTNAME),
                &labels.cluster,
                &labels.severity,
            );
        }

        Ok(batch)
    }

    /// Fails fast, unlike the telegram variant.
    pub fn sms_splunk(&self, keys: &[String], event: &SplunkEvent) -> Result<String, RenderError> {
        sms::render_splunk(keys, event)
    }
}

/// Lowercased group labels used by the render counters.
struct GroupLabels {
    status: String,
    alertname: String,
    cluster: String,
    severity: String,
}

impl GroupLabels {
    fn of(event: &AlertEvent) -> Self {
        let label = |name: &str| {
            event
                .common_label(name)
                .unwrap_or("unknown")
                .to_lowercase()
        };
        Self {
            status: event.status.to_lowercase(),
            alertname: label("alertname"),
            cluster: label("cluster"),
            severity: label("severity"),
        }
    }
}
