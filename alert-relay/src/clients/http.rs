//! Outbound HTTP transport.
//!
//! [`HttpSend`] is the only place the gateway touches the network; every
//! channel client goes through it so tests can script responses.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::metrics::MetricsCollector;
use crate::{Error, Result};

/// Timeout applied to every outbound request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A request description, independent of the HTTP client in use.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    /// Metric label for the endpoint: the host only, so credentials carried
    /// in URL paths never become label values.
    pub fn destination(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|url| {
                url.host_str().map(|host| match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                })
            })
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundResponse {
    pub status: u16,
    pub body: String,
}

impl OutboundResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends one request, once. Non-2xx statuses are responses, not errors.
#[async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<OutboundResponse>;
}

/// [`HttpSend`] backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        install_rustls_provider();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSend for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<OutboundResponse> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form(fields) => builder.form(fields),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(OutboundResponse { status, body })
    }
}

/// Plain request/response calls with a permissive retry policy.
///
/// A status >= 400 or a transport error is retried after a fixed sleep. The
/// last response is returned, which is `None` if every attempt failed at the
/// transport level; callers must check the status themselves.
#[derive(Clone)]
pub struct OutboundCaller {
    transport: Arc<dyn HttpSend>,
    metrics: Arc<MetricsCollector>,
}

impl OutboundCaller {
    pub fn new(transport: Arc<dyn HttpSend>, metrics: Arc<MetricsCollector>) -> Self {
        Self { transport, metrics }
    }

    pub async fn call(
        &self,
        request: &OutboundRequest,
        retry_count: u32,
        interval: Duration,
    ) -> Option<OutboundResponse> {
        let attempts = retry_count.max(1);
        let destination = request.destination();
        let mut last = None;

        for attempt in 1..=attempts {
            debug!(destination = %destination, method = %request.method, "Calling outbound API");

            match self.transport.send(request).await {
                Ok(response) => {
                    self.metrics
                        .record_api_call(&destination, response.status, request.method.as_str());
                    if response.status < 400 {
                        debug!(
                            destination = %destination,
                            status = response.status,
                            "Outbound API called successfully"
                        );
                        return Some(response);
                    }
                    error!(
                        destination = %destination,
                        status = response.status,
                        attempt,
                        "Got error status from outbound API"
                    );
                    last = Some(response);
                }
                Err(e) => {
                    error!(
                        destination = %destination,
                        method = %request.method,
                        attempt,
                        error = %e,
                        "Error while calling outbound API"
                    );
                }
            }

            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        last
    }
}

/// Maps a missing or failed response to a delivery error.
pub(crate) fn require_success(
    channel: &'static str,
    response: Option<OutboundResponse>,
) -> Result<OutboundResponse> {
    match response {
        Some(response) if response.is_success() => Ok(response),
        Some(response) => Err(Error::delivery(
            channel,
            format!("status {}: {}", response.status, response.body),
        )),
        None => Err(Error::delivery(channel, "no response received")),
    }
}
