//! Fan-out of a matched destination to its channel targets.
//!
//! Targets run sequentially in table order. A failure in one target is
//! logged and counted, and the remaining targets are still attempted.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::sms::SmsDelivery;
use super::telegram::TelegramDelivery;
use crate::Result;
use crate::domain::{AlertEvent, SplunkEvent};
use crate::metrics::MetricsCollector;
use crate::render::{MessageRenderer, SPLUNK_CLUSTER, SmsBatch};
use crate::routing::{ChannelTarget, Destination, SmsTarget, SplunkDestination, TelegramTarget};

/// Outcome counts for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
    /// Targets whose channel is disabled.
    pub skipped: usize,
}

/// Inbound event plus what the splunk path needs to render it.
enum Source<'a> {
    Prometheus(&'a AlertEvent),
    Splunk {
        route: &'a str,
        keys: &'a [String],
        event: &'a SplunkEvent,
    },
}

impl Source<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Prometheus(_) => "prometheus",
            Self::Splunk { .. } => "splunk",
        }
    }
}

/// Runs renderer and handler for every target of a destination. A channel
/// without a handler is disabled.
pub struct ChannelDispatcher {
    renderer: Arc<MessageRenderer>,
    telegram: Option<Arc<dyn TelegramDelivery>>,
    sms: Option<Arc<dyn SmsDelivery>>,
    metrics: Arc<MetricsCollector>,
}

impl ChannelDispatcher {
    pub fn new(
        renderer: Arc<MessageRenderer>,
        telegram: Option<Arc<dyn TelegramDelivery>>,
        sms: Option<Arc<dyn SmsDelivery>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            renderer,
            telegram,
            sms,
            metrics,
        }
    }

    pub fn telegram(&self) -> Option<&Arc<dyn TelegramDelivery>> {
        self.telegram.as_ref()
    }

    pub fn sms(&self) -> Option<&Arc<dyn SmsDelivery>> {
        self.sms.as_ref()
    }

    pub async fn dispatch_prometheus(
        &self,
        destination: &Destination,
        event: &AlertEvent,
    ) -> DispatchSummary {
        info!(receiver = %event.receiver, targets = destination.types.len(), "Dispatching prometheus alert");
        self.dispatch(&destination.types, Source::Prometheus(event))
            .await
    }

    pub async fn dispatch_splunk(
        &self,
        destination: &SplunkDestination,
        route: &str,
        event: &SplunkEvent,
    ) -> DispatchSummary {
        info!(route = %route, targets = destination.types.len(), "Dispatching splunk alert");
        self.dispatch(
            &destination.types,
            Source::Splunk {
                route,
                keys: &destination.keys,
                event,
            },
        )
        .await
    }

    async fn dispatch(&self, targets: &[ChannelTarget], source: Source<'_>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for target in targets {
            let outcome = match target {
                ChannelTarget::Telegram(target) => match &self.telegram {
                    Some(handler) => Some(self.telegram_target(&**handler, target, &source).await),
                    None => None,
                },
                ChannelTarget::Sms(target) => match &self.sms {
                    Some(handler) => Some(self.sms_target(&**handler, target, &source).await),
                    None => None,
                },
                ChannelTarget::Unknown { kind } => {
                    debug!(kind = %kind, "Ignoring unknown channel type");
                    continue;
                }
            };

            match outcome {
                Some(Ok(())) => summary.delivered += 1,
                Some(Err(e)) => {
                    error!(
                        channel = target.kind(),
                        source = source.name(),
                        error = %e,
                        "Channel target failed"
                    );
                    self.metrics
                        .record_dispatch_failure(target.kind(), source.name());
                    summary.failed += 1;
                }
                None => {
                    warn!(
                        channel = target.kind(),
                        source = source.name(),
                        "Channel is not active, alert will not be sent"
                    );
                    summary.skipped += 1;
                }
            }
        }

        summary
    }

    async fn telegram_target(
        &self,
        handler: &dyn TelegramDelivery,
        target: &TelegramTarget,
        source: &Source<'_>,
    ) -> Result<()> {
        match source {
            Source::Prometheus(event) => {
                let message = self.renderer.telegram_prometheus(event)?;
                debug!(text = %message.text, "Generated telegram message");
                handler.deliver(target, &message, &event.receiver).await
            }
            Source::Splunk { route, keys, event } => {
                let message = self.renderer.telegram_splunk(keys, event);
                debug!(text = %message.text, "Generated telegram message");
                handler.deliver(target, &message, route).await
            }
        }
    }

    async fn sms_target(
        &self,
        handler: &dyn SmsDelivery,
        target: &SmsTarget,
        source: &Source<'_>,
    ) -> Result<()> {
        let batch = match source {
            Source::Prometheus(event) => self.renderer.sms_prometheus(event)?,
            Source::Splunk { route, keys, event } => {
                let message = self.renderer.sms_splunk(keys, event)?;
                SmsBatch::single(message, *route, SPLUNK_CLUSTER)
            }
        };
        debug!(messages = ?batch.messages, "Generated sms messages");
        handler.deliver(target, &batch).await
    }
}
