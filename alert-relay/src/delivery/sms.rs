//! SMS delivery handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::recipients::{RecipientResolver, is_valid_number};
use super::retry::RetryExecutor;
use crate::clients::sms::SmsTransport;
use crate::metrics::MetricsCollector;
use crate::render::{SmsBatch, suppression_notice};
use crate::routing::SmsTarget;
use crate::{Error, Result};

/// Delivers a rendered batch to one SMS target.
#[async_trait]
pub trait SmsDelivery: Send + Sync {
    async fn deliver(&self, target: &SmsTarget, batch: &SmsBatch) -> Result<()>;
}

pub struct SmsHandler {
    resolver: RecipientResolver,
    transport: Arc<dyn SmsTransport>,
    retry: RetryExecutor,
    metrics: Arc<MetricsCollector>,
    default_sender: String,
    /// Real messages sent per capped batch before the suppression notice.
    message_cap: usize,
}

impl SmsHandler {
    pub fn new(
        resolver: RecipientResolver,
        transport: Arc<dyn SmsTransport>,
        retry: RetryExecutor,
        metrics: Arc<MetricsCollector>,
        default_sender: impl Into<String>,
        message_cap: usize,
    ) -> Self {
        Self {
            resolver,
            transport,
            retry,
            metrics,
            default_sender: default_sender.into(),
            message_cap,
        }
    }

    /// Validates, then sends with retry. Validation failures are never
    /// retried and never reach the transport.
    pub async fn send(
        &self,
        group: &str,
        cluster: &str,
        recipients: &[String],
        message: &str,
        sender: &str,
    ) -> Result<()> {
        validate(recipients, message)?;

        let result = self
            .retry
            .run("sms send", || {
                self.metrics.record_sms_attempt(group, cluster, recipients);
                self.transport.send_bulk(recipients, message, sender)
            })
            .await;

        result.map_err(|e| {
            self.metrics.record_sms_failure(group, cluster);
            error!(group = %group, message = %message, "Error happened while sending sms");
            Error::delivery(
                "sms",
                format!(
                    "failed to send bulk SMS after {} attempts: {}",
                    self.retry.max_retries(),
                    e
                ),
            )
        })
    }
}

fn validate(recipients: &[String], message: &str) -> Result<()> {
    if recipients.is_empty() {
        return Err(Error::validation("recipient list cannot be empty"));
    }
    if let Some(invalid) = recipients.iter().find(|n| !is_valid_number(n)) {
        return Err(Error::validation(format!("invalid phone number: {invalid}")));
    }
    if message.trim().is_empty() {
        return Err(Error::validation("message cannot be empty"));
    }
    Ok(())
}

#[async_trait]
impl SmsDelivery for SmsHandler {
    async fn deliver(&self, target: &SmsTarget, batch: &SmsBatch) -> Result<()> {
        let group = target.group_name.as_str();
        let recipients = self.resolver.resolve(group).await?;
        let sender = target.sender.as_deref().unwrap_or(&self.default_sender);

        let total = batch.messages.len();
        let mut failed = 0;

        for (index, message) in batch.messages.iter().enumerate() {
            let cap_reached = batch.capped && index == self.message_cap;
            let text = if cap_reached {
                warn!(
                    group = %group,
                    alertname = %batch.alertname,
                    suppressed = total - index,
                    "SMS limit reached for alert group"
                );
                suppression_notice(total - index, &batch.alertname)
            } else {
                message.clone()
            };

            if let Err(e) = self
                .send(group, &batch.cluster, &recipients, &text, sender)
                .await
            {
                error!(group = %group, error = %e, "SMS message failed");
                failed += 1;
            }

            if cap_reached {
                break;
            }
        }

        if failed > 0 {
            return Err(Error::delivery(
                "sms",
                format!("{failed} message(s) to group {group} failed"),
            ));
        }
        info!(group = %group, recipients = recipients.len(), "SMS batch delivered");
        Ok(())
    }
}
