//! Bulk SMS provider client.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::http::{HttpSend, OutboundRequest};
use crate::{Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api.kavenegar.com";

/// One bulk send to every recipient at once.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send_bulk(&self, recipients: &[String], message: &str, sender: &str) -> Result<()>;
}

/// Kavenegar REST client: `POST {base}/v1/{api_key}/sms/send.json`.
pub struct SmsClient {
    transport: Arc<dyn HttpSend>,
    base_url: String,
    api_key: String,
}

impl SmsClient {
    pub fn new(
        transport: Arc<dyn HttpSend>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn send_url(&self) -> String {
        format!("{}/v1/{}/sms/send.json", self.base_url, self.api_key)
    }
}

#[async_trait]
impl SmsTransport for SmsClient {
    async fn send_bulk(&self, recipients: &[String], message: &str, sender: &str) -> Result<()> {
        let request = OutboundRequest::post(self.send_url()).form(vec![
            ("receptor".to_string(), recipients.join(",")),
            ("message".to_string(), message.to_string()),
            ("sender".to_string(), sender.to_string()),
        ]);

        debug!(recipients = recipients.len(), "Sending bulk SMS");
        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(Error::delivery(
                "sms",
                format!("status {}: {}", response.status, response.body),
            ));
        }

        info!(recipients = recipients.len(), "Bulk SMS sent successfully");
        Ok(())
    }
}
