//! Alertmanager-style webhook payload.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Label or annotation set.
pub type LabelSet = BTreeMap<String, String>;

fn default_receiver() -> String {
    "Default".to_string()
}

fn default_status() -> String {
    "firing default".to_string()
}

/// One alert group posted by Alertmanager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    #[serde(default = "default_receiver")]
    pub receiver: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub common_labels: LabelSet,
    #[serde(default)]
    pub common_annotations: LabelSet,
}

/// A single alert inside a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub annotations: LabelSet,
    #[serde(default)]
    pub starts_at: String,
    #[serde(default)]
    pub ends_at: String,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl AlertEvent {
    /// Severity label of the first alert, used for destination matching.
    pub fn first_alert_severity(&self) -> Option<&str> {
        self.alerts
            .first()
            .and_then(|alert| alert.labels.get("severity"))
            .map(String::as_str)
    }

    pub fn common_label(&self, name: &str) -> Option<&str> {
        self.common_labels.get(name).map(String::as_str)
    }

    pub fn common_annotation(&self, name: &str) -> Option<&str> {
        self.common_annotations.get(name).map(String::as_str)
    }
}

impl Alert {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn annotation(&self, name: &str) -> Option<&str> {
        self.annotations.get(name).map(String::as_str)
    }
}

/// Recognised alert status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    /// Parses a raw status. Alertmanager sends `firing` / `resolved`, but the
    /// payload default is `firing default`, so containment is what counts.
    pub fn parse(raw: &str) -> Result<Self, RenderError> {
        let lowered = raw.to_lowercase();
        if lowered.contains("firing") {
            Ok(Self::Firing)
        } else if lowered.contains("resolved") {
            Ok(Self::Resolved)
        } else {
            Err(RenderError::InvalidStatus(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_missing() {
        let event: AlertEvent = serde_json::from_str(r#"{"alerts": [{}]}"#).unwrap();
        assert_eq!(event.receiver, "Default");
        assert_eq!(event.status, "firing default");
        assert_eq!(event.alerts.len(), 1);
        assert_eq!(event.alerts[0].status, "firing default");
        assert!(event.common_labels.is_empty());
    }

    #[test]
    fn test_alertmanager_payload() {
        let raw = r#"{
            "receiver": "sre",
            "status": "firing",
            "alerts": [{
                "status": "firing",
                "labels": {"alertname": "HighCPU", "severity": "critical"},
                "annotations": {"description": "cpu > 90%"},
                "startsAt": "2024-05-01T10:00:00Z",
                "endsAt": "0001-01-01T00:00:00Z",
                "generatorURL": "http://prom/graph",
                "fingerprint": "abc"
            }],
            "commonLabels": {"severity": "critical"},
            "commonAnnotations": {"summary": "CPU"}
        }"#;
        let event: AlertEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.first_alert_severity(), Some("critical"));
        assert_eq!(event.alerts[0].starts_at, "2024-05-01T10:00:00Z");
        assert_eq!(event.alerts[0].generator_url, "http://prom/graph");
        assert_eq!(event.common_annotation("summary"), Some("CPU"));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(AlertStatus::parse("FIRING").unwrap(), AlertStatus::Firing);
        assert_eq!(
            AlertStatus::parse("firing default").unwrap(),
            AlertStatus::Firing
        );
        assert_eq!(
            AlertStatus::parse("Resolved").unwrap(),
            AlertStatus::Resolved
        );
        assert_eq!(
            AlertStatus::parse("pending"),
            Err(RenderError::InvalidStatus("pending".to_string()))
        );
    }
}
