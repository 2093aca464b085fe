//! SMS text for Prometheus and Splunk alerts.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::domain::{Alert, AlertEvent, AlertStatus, SplunkEvent, display_value};
use crate::error::RenderError;
use crate::template::Template;

static ALERT_TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::parse("{status}: {alertname}\nCluster: {cluster}\n{description}\n{datetime}")
});
static SUPPRESSION_NOTICE: LazyLock<Template> = LazyLock::new(|| {
    Template::parse(
        "There are {count} more messages related to alertname {alertname} skipped for your convenience.",
    )
});

pub(crate) const NO_ALERTNAME: &str = "No Alertname";
const NO_CLUSTERNAME: &str = "No Clustername";
const NO_VALUE: &str = "No value!";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Messages for one alert group, with the names the batch is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsBatch {
    pub messages: Vec<String>,
    pub alertname: String,
    pub cluster: String,
    /// Whether the per-group message cap applies to this batch.
    pub capped: bool,
}

impl SmsBatch {
    /// A single uncapped message.
    pub fn single(message: String, alertname: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            messages: vec![message],
            alertname: alertname.into(),
            cluster: cluster.into(),
            capped: false,
        }
    }
}

/// Notice sent in place of the messages beyond the cap.
pub fn suppression_notice(remaining: usize, alertname: &str) -> String {
    let count = remaining.to_string();
    SUPPRESSION_NOTICE.render(&[("count", count.as_str()), ("alertname", alertname)])
}

/// One message per alert, in order.
pub(crate) fn render_prometheus(event: &AlertEvent, timezone: Tz) -> Result<SmsBatch, RenderError> {
    let status = capitalize(&event.status);
    let mut messages = Vec::with_capacity(event.alerts.len());
    let mut alertname = NO_ALERTNAME;
    let mut cluster = NO_CLUSTERNAME;

    for alert in &event.alerts {
        alertname = alert.label("alertname").unwrap_or(NO_ALERTNAME);
        cluster = alert.label("cluster").unwrap_or(NO_CLUSTERNAME);
        let datetime = alert_datetime(alert, timezone)?;

        messages.push(ALERT_TEMPLATE.render(&[
            ("status", status.as_str()),
            ("alertname", alertname),
            ("cluster", cluster),
            (
                "description",
                alert.annotation("description").unwrap_or(super::telegram::NO_DESCRIPTION),
            ),
            ("datetime", datetime.as_str()),
        ]));
    }

    // The batch is reported under the last alert's names.
    Ok(SmsBatch {
        messages,
        alertname: alertname.to_string(),
        cluster: cluster.to_string(),
        capped: true,
    })
}

/// Plain `key: value` lines. Fails when there is nothing to send.
pub(crate) fn render_splunk(keys: &[String], event: &SplunkEvent) -> Result<String, RenderError> {
    if keys.is_empty() {
        return Err(RenderError::EmptyMessage);
    }

    let mut message = String::new();
    for key in keys {
        let value = event
            .get(key)
            .map(display_value)
            .unwrap_or_else(|| NO_VALUE.to_string());
        message.push_str(&format!("{key}: {value}\n"));
    }
    Ok(message)
}

fn alert_datetime(alert: &Alert, timezone: Tz) -> Result<String, RenderError> {
    let (prefix, raw) = match AlertStatus::parse(&alert.status) {
        Ok(AlertStatus::Firing) => ("Started", &alert.starts_at),
        Ok(AlertStatus::Resolved) => ("Resolved", &alert.ends_at),
        Err(_) => return Ok(String::new()),
    };

    let utc = parse_utc(raw)?;
    Ok(format!(
        "{prefix}: {}",
        utc.with_timezone(&timezone).format(DISPLAY_FORMAT)
    ))
}

/// RFC 3339 first; a timestamp without offset is taken as UTC.
fn parse_utc(raw: &str) -> Result<DateTime<Utc>, RenderError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| RenderError::InvalidTimestamp {
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: &str) -> AlertEvent {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_one_message_per_alert_in_local_time() {
        let event = event(
            r#"{
                "status": "FIRING",
                "alerts": [
                    {"status": "firing", "labels": {"alertname": "DiskFull", "cluster": "prod"},
                     "annotations": {"description": "/var at 99%"}, "startsAt": "2024-05-01T10:00:00.123Z"},
                    {"status": "resolved", "labels": {"alertname": "DiskFull", "cluster": "dr"},
                     "endsAt": "2024-05-01T11:30:00+00:00"}
                ]
            }"#,
        );
        let batch = render_prometheus(&event, chrono_tz::Asia::Tehran).unwrap();
        assert_eq!(
            batch.messages,
            vec![
                "Firing: DiskFull\nCluster: prod\n/var at 99%\nStarted: 2024-05-01 13:30:00+03:30",
                "Firing: DiskFull\nCluster: dr\nNO DESCRIPTION!\nResolved: 2024-05-01 15:00:00+03:30",
            ]
        );
        assert_eq!(batch.alertname, "DiskFull");
        assert_eq!(batch.cluster, "dr");
        assert!(batch.capped);
    }

    #[test]
    fn test_defaults_and_naive_timestamp() {
        let event = event(r#"{"status": "firing", "alerts": [{"status": "firing", "startsAt": "2024-01-01 00:00:00"}]}"#);
        let batch = render_prometheus(&event, Tz::UTC).unwrap();
        assert_eq!(
            batch.messages[0],
            "Firing: No Alertname\nCluster: No Clustername\nNO DESCRIPTION!\nStarted: 2024-01-01 00:00:00+00:00"
        );
    }

    #[test]
    fn test_invalid_timestamp_fails() {
        let event = event(r#"{"alerts": [{"status": "firing", "startsAt": "yesterday"}]}"#);
        assert!(matches!(
            render_prometheus(&event, Tz::UTC),
            Err(RenderError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_splunk_lines() {
        let event = SplunkEvent::from_body(br#"{"search_name": "Failed logins", "count": 3}"#);
        let keys = vec!["search_name".to_string(), "count".to_string(), "host".to_string()];
        assert_eq!(
            render_splunk(&keys, &event).unwrap(),
            "search_name: Failed logins\ncount: 3\nhost: No value!\n"
        );
        assert_eq!(render_splunk(&[], &event), Err(RenderError::EmptyMessage));
    }

    #[test]
    fn test_suppression_notice() {
        assert_eq!(
            suppression_notice(3, "DiskFull"),
            "There are 3 more messages related to alertname DiskFull skipped for your convenience."
        );
    }
}
