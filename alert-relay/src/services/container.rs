//! Service container for dependency injection.
//!
//! Builds every shared client and handler once at startup and hands them to
//! the HTTP layer by `Arc`. Background tasks (routing reload, telegram
//! polling) are tied to one cancellation token.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::clients::{
    HttpPhoneDirectory, HttpSend, OutboundCaller, ReqwestTransport, SmsClient, TelegramBot,
    http::DEFAULT_REQUEST_TIMEOUT,
};
use crate::config::{GatewayConfig, TelegramMode};
use crate::delivery::{
    ApiModeTelegram, BotModeTelegram, ChannelDispatcher, RecipientResolver, RetryExecutor,
    SmsDelivery, SmsHandler, TelegramDelivery,
};
use crate::metrics::MetricsCollector;
use crate::render::MessageRenderer;
use crate::routing::RoutingStore;

/// Application services, shared by all requests.
pub struct ServiceContainer {
    pub config: Arc<GatewayConfig>,
    pub metrics: Arc<MetricsCollector>,
    /// Current routing snapshot and its reloader.
    pub routing: Arc<RoutingStore>,
    pub dispatcher: Arc<ChannelDispatcher>,
    /// Concrete SMS handler for the staging probe route; also inside the
    /// dispatcher. `None` when SMS is disabled.
    pub sms_handler: Option<Arc<SmsHandler>>,
    /// Bot client whose callback polling runs in bot mode only.
    telegram_bot: Option<Arc<TelegramBot>>,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Create the container with the production reqwest transport.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(DEFAULT_REQUEST_TIMEOUT)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create the container over any outbound transport.
    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn HttpSend>) -> Self {
        let metrics = Arc::new(MetricsCollector::new());
        let caller = OutboundCaller::new(transport.clone(), metrics.clone());

        let routing = Arc::new(RoutingStore::new(config.routing.source(), metrics.clone()));
        let renderer = Arc::new(MessageRenderer::new(
            config.timezone,
            config.splunk_public_host.clone(),
            metrics.clone(),
        ));

        let tg = &config.telegram;
        let telegram_retry = RetryExecutor::new(tg.send_retries, tg.retry_delay);
        let bot = Arc::new(TelegramBot::new(
            transport.clone(),
            tg.api_base_url.clone(),
            tg.bot_token.clone(),
        ));

        let (telegram, telegram_bot): (Option<Arc<dyn TelegramDelivery>>, _) =
            match tg.enabled_mode() {
                Some(TelegramMode::Bot) => {
                    info!("Telegram enabled in bot mode");
                    let handler: Arc<dyn TelegramDelivery> = Arc::new(BotModeTelegram::new(
                        bot.clone(),
                        telegram_retry,
                        metrics.clone(),
                    ));
                    (Some(handler), Some(bot))
                }
                Some(TelegramMode::Api) => {
                    info!("Telegram enabled in api mode");
                    let handler: Arc<dyn TelegramDelivery> = Arc::new(ApiModeTelegram::new(
                        bot,
                        caller.clone(),
                        telegram_retry,
                        metrics.clone(),
                    ));
                    (Some(handler), None)
                }
                None => {
                    warn!("Telegram is not active, no alerts will be sent by telegram");
                    (None, None)
                }
            };

        let sms_handler = if config.sms.active {
            let directory = HttpPhoneDirectory::new(
                caller.clone(),
                &config.directory.url,
                &config.directory.route,
            );
            let client = SmsClient::new(
                transport,
                config.sms.api_base_url.clone(),
                config.sms.api_key.clone(),
            );
            let handler = SmsHandler::new(
                RecipientResolver::new(Arc::new(directory), metrics.clone()),
                Arc::new(client),
                RetryExecutor::new(config.sms.send_retries, config.sms.retry_delay),
                metrics.clone(),
                config.sms.default_sender.clone(),
                config.sms.message_cap,
            );
            info!(message_cap = config.sms.message_cap, "SMS enabled");
            Some(Arc::new(handler))
        } else {
            warn!("SMS is not active, no alerts will be sent by SMS");
            None
        };

        let sms: Option<Arc<dyn SmsDelivery>> = sms_handler
            .clone()
            .map(|handler| handler as Arc<dyn SmsDelivery>);
        let dispatcher = Arc::new(ChannelDispatcher::new(
            renderer,
            telegram,
            sms,
            metrics.clone(),
        ));

        Self {
            config: Arc::new(config),
            metrics,
            routing,
            dispatcher,
            sms_handler,
            telegram_bot,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Loads the routing table and starts the background tasks.
    ///
    /// Fails if the first routing load fails; later reload failures only log.
    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing services");

        self.routing.reload().await?;
        self.routing.spawn_reloader(
            self.config.routing.reload_interval,
            self.cancellation_token.clone(),
        );
        info!(
            interval = ?self.config.routing.reload_interval,
            "Routing reloader started"
        );

        if let Some(bot) = &self.telegram_bot {
            if self.config.telegram.enable_polling {
                tokio::spawn(bot.clone().run_polling(self.cancellation_token.clone()));
            } else {
                info!("Telegram polling disabled, silence buttons will not be answered");
            }
        }

        info!("Services initialized");
        Ok(())
    }

    /// Stops background tasks.
    pub fn shutdown(&self) {
        info!("Shutting down services");
        self.cancellation_token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
