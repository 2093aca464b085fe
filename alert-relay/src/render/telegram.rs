//! Telegram text for Prometheus alert groups.

use std::sync::LazyLock;

use crate::domain::{Alert, AlertEvent, AlertStatus};
use crate::error::RenderError;
use crate::template::Template;

static FIRING_HEADER: LazyLock<Template> = LazyLock::new(|| {
    Template::parse(
        "<b>{alertname}</b>\n\n<b><i>Cluster:</i> {cluster} </b>\n<b><i>Summary:</i> {summary} </b>\n\n",
    )
});
static RESOLVED_HEADER: LazyLock<Template> =
    LazyLock::new(|| Template::parse("<s><b>{alertname}</b></s>\n\n<i>Summary:</i> {summary}\n\n"));
static FIRING_BODY: LazyLock<Template> =
    LazyLock::new(|| Template::parse("🔴 {description} {runbook}\n\n"));
static RESOLVED_BODY: LazyLock<Template> =
    LazyLock::new(|| Template::parse("🟢 {description} {runbook}\n\n"));
static RUNBOOK_LINK: LazyLock<Template> =
    LazyLock::new(|| Template::parse("\n<a href=\"{url}\">Document</a>"));

const NO_ALERTNAME: &str = "No alertname has been added for this alert!";
pub(crate) const NO_CLUSTER: &str = "No Cluster!";
const NO_SUMMARY: &str = "No summary has been added for this alert!";
pub(crate) const NO_DESCRIPTION: &str = "NO DESCRIPTION!";

const UNKNOWN_ICON: &str = "❓ ";

fn severity_icon(severity: &str) -> &'static str {
    match severity {
        "critical" => "‼️ ",
        "warning" => "⚠️ ",
        "disaster" => "🔥 ",
        "info" => "📢 ",
        "resolved" => "✅ ",
        _ => UNKNOWN_ICON,
    }
}

/// Rendered group text plus the labels used for delivery metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramMessage {
    pub text: String,
    pub cluster: String,
    pub severity: String,
}

/// Builds the header followed by one body per alert.
///
/// Any status that is neither firing nor resolved, on the group or on any
/// single alert, discards the whole message.
pub(crate) fn render(event: &AlertEvent) -> Result<TelegramMessage, RenderError> {
    let severity = event
        .common_label("severity")
        .ok_or(RenderError::MissingSeverity)?
        .to_lowercase();
    let cluster = event.common_label("cluster").unwrap_or(NO_CLUSTER);

    let (icon, header) = match AlertStatus::parse(&event.status)? {
        AlertStatus::Firing => (severity_icon(&severity), &*FIRING_HEADER),
        AlertStatus::Resolved => (severity_icon("resolved"), &*RESOLVED_HEADER),
    };

    let mut text = String::from(icon);
    header.render_into(
        &mut text,
        &[
            ("alertname", event.common_label("alertname").unwrap_or(NO_ALERTNAME)),
            ("cluster", cluster),
            ("summary", event.common_annotation("summary").unwrap_or(NO_SUMMARY)),
        ],
    );

    for alert in &event.alerts {
        render_body(&mut text, alert)?;
    }

    Ok(TelegramMessage {
        text,
        cluster: cluster.to_string(),
        severity,
    })
}

fn render_body(out: &mut String, alert: &Alert) -> Result<(), RenderError> {
    let body = match AlertStatus::parse(&alert.status)? {
        AlertStatus::Firing => &*FIRING_BODY,
        AlertStatus::Resolved => &*RESOLVED_BODY,
    };

    let runbook = alert
        .annotation("runbook_url")
        .map(|url| RUNBOOK_LINK.render(&[("url", url)]))
        .unwrap_or_default();

    body.render_into(
        out,
        &[
            ("description", alert.annotation("description").unwrap_or(NO_DESCRIPTION)),
            ("runbook", runbook.as_str()),
        ],
    );
    Ok(())
}
