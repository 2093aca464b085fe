//! Metrics collector implementation.
//!
//! Collects counter and gauge series for the gateway. Every series is keyed
//! by its metric family and the label values in the family's label order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Metric families emitted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    KeycloakGroupMembers,
    SentSmsPerNumber,
    SentSmsPerCluster,
    FailedSentSmsPerCluster,
    SentTelegramPerReceiver,
    FailedSentTelegramPerReceiver,
    TemplaterSmsAlert,
    TemplaterTelegramAlert,
    ApiCallStatusCount,
    DispatchFailures,
    ConfigReloadFailures,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::KeycloakGroupMembers,
        Metric::SentSmsPerNumber,
        Metric::SentSmsPerCluster,
        Metric::FailedSentSmsPerCluster,
        Metric::SentTelegramPerReceiver,
        Metric::FailedSentTelegramPerReceiver,
        Metric::TemplaterSmsAlert,
        Metric::TemplaterTelegramAlert,
        Metric::ApiCallStatusCount,
        Metric::DispatchFailures,
        Metric::ConfigReloadFailures,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::KeycloakGroupMembers => "keycloak_group_members",
            Self::SentSmsPerNumber => "sent_sms_per_number",
            Self::SentSmsPerCluster => "sent_sms_per_cluster",
            Self::FailedSentSmsPerCluster => "failed_sent_sms_per_cluster",
            Self::SentTelegramPerReceiver => "sent_telegram_per_receiver",
            Self::FailedSentTelegramPerReceiver => "failed_sent_telegram_per_receiver",
            Self::TemplaterSmsAlert => "templater_sms_alert",
            Self::TemplaterTelegramAlert => "templater_telegram_alert",
            Self::ApiCallStatusCount => "api_call_status_count",
            Self::DispatchFailures => "dispatch_failures",
            Self::ConfigReloadFailures => "config_reload_failures",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Self::KeycloakGroupMembers => "Number of members in the directory groups used for SMS",
            Self::SentSmsPerNumber => "Number of SMS send attempts per phone number",
            Self::SentSmsPerCluster => "Number of SMS send attempts per directory group",
            Self::FailedSentSmsPerCluster => "Number of failed SMS sends per directory group",
            Self::SentTelegramPerReceiver => "Number of telegram send attempts",
            Self::FailedSentTelegramPerReceiver => "Number of failed telegram sends",
            Self::TemplaterSmsAlert => "Number of alerts rendered for SMS",
            Self::TemplaterTelegramAlert => "Number of alerts rendered for telegram",
            Self::ApiCallStatusCount => "Outbound API calls by destination and status code",
            Self::DispatchFailures => "Channel targets that failed during dispatch",
            Self::ConfigReloadFailures => "Routing table reloads that failed",
        }
    }

    pub fn label_names(self) -> &'static [&'static str] {
        match self {
            Self::KeycloakGroupMembers => &["group_name"],
            Self::SentSmsPerNumber => &["group_name", "cluster", "number"],
            Self::SentSmsPerCluster | Self::FailedSentSmsPerCluster => &["group_name", "cluster"],
            Self::SentTelegramPerReceiver | Self::FailedSentTelegramPerReceiver => {
                &["cluster", "severity", "receiver"]
            }
            Self::TemplaterSmsAlert | Self::TemplaterTelegramAlert => {
                &["status", "alertname", "cluster", "severity"]
            }
            Self::ApiCallStatusCount => &["destination", "status_code", "method"],
            Self::DispatchFailures => &["channel", "source"],
            Self::ConfigReloadFailures => &[],
        }
    }

    pub fn is_gauge(self) -> bool {
        matches!(self, Self::KeycloakGroupMembers)
    }
}

/// One labelled series value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub labels: Vec<String>,
    pub value: u64,
}

/// Point-in-time copy of every series.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub series: BTreeMap<Metric, Vec<Sample>>,
    pub config_reload_failures: u64,
}

/// Metrics collector for the gateway.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    series: DashMap<(Metric, Vec<String>), AtomicU64>,
    config_reload_failures: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(metric: Metric, labels: &[&str]) -> (Metric, Vec<String>) {
        debug_assert_eq!(labels.len(), metric.label_names().len());
        (metric, labels.iter().map(|v| v.to_string()).collect())
    }

    fn increment(&self, metric: Metric, labels: &[&str]) {
        self.series
            .entry(Self::key(metric, labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn set(&self, metric: Metric, labels: &[&str], value: u64) {
        self.series
            .entry(Self::key(metric, labels))
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Current value of one series, zero if it was never touched.
    pub fn value(&self, metric: Metric, labels: &[&str]) -> u64 {
        if metric == Metric::ConfigReloadFailures {
            return self.config_reload_failures.load(Ordering::Relaxed);
        }
        self.series
            .get(&Self::key(metric, labels))
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // ========== SMS ==========

    /// Record how many members a directory group resolved to.
    pub fn set_group_members(&self, group: &str, count: usize) {
        self.set(Metric::KeycloakGroupMembers, &[group], count as u64);
    }

    /// Record one SMS send attempt to a group and each of its recipients.
    pub fn record_sms_attempt(&self, group: &str, cluster: &str, recipients: &[String]) {
        self.increment(Metric::SentSmsPerCluster, &[group, cluster]);
        for number in recipients {
            self.increment(Metric::SentSmsPerNumber, &[group, cluster, number]);
        }
    }

    pub fn record_sms_failure(&self, group: &str, cluster: &str) {
        self.increment(Metric::FailedSentSmsPerCluster, &[group, cluster]);
    }

    // ========== Telegram ==========

    pub fn record_telegram_attempt(&self, cluster: &str, severity: &str, receiver: &str) {
        self.increment(Metric::SentTelegramPerReceiver, &[cluster, severity, receiver]);
    }

    pub fn record_telegram_failure(&self, cluster: &str, severity: &str, receiver: &str) {
        self.increment(
            Metric::FailedSentTelegramPerReceiver,
            &[cluster, severity, receiver],
        );
    }

    // ========== Rendering ==========

    pub fn record_sms_rendered(&self, status: &str, alertname: &str, cluster: &str, severity: &str) {
        self.increment(
            Metric::TemplaterSmsAlert,
            &[status, alertname, cluster, severity],
        );
    }

    pub fn record_telegram_rendered(
        &self,
        status: &str,
        alertname: &str,
        cluster: &str,
        severity: &str,
    ) {
        self.increment(
            Metric::TemplaterTelegramAlert,
            &[status, alertname, cluster, severity],
        );
    }

    // ========== Plumbing ==========

    /// Record a response received from an outbound API.
    pub fn record_api_call(&self, destination: &str, status_code: u16, method: &str) {
        let status_code = status_code.to_string();
        self.increment(
            Metric::ApiCallStatusCount,
            &[destination, &status_code, method],
        );
    }

    pub fn record_dispatch_failure(&self, channel: &str, source: &str) {
        self.increment(Metric::DispatchFailures, &[channel, source]);
    }

    pub fn record_config_reload_failure(&self) {
        self.config_reload_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics, series sorted by label values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut series: BTreeMap<Metric, Vec<Sample>> = BTreeMap::new();
        for entry in self.series.iter() {
            let (metric, labels) = entry.key();
            series.entry(*metric).or_default().push(Sample {
                labels: labels.clone(),
                value: entry.value().load(Ordering::Relaxed),
            });
        }
        for samples in series.values_mut() {
            samples.sort_by(|a, b| a.labels.cmp(&b.labels));
        }

        MetricsSnapshot {
            series,
            config_reload_failures: self.config_reload_failures.load(Ordering::Relaxed),
        }
    }
}
