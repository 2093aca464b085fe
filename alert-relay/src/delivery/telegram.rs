//! Telegram delivery handlers.
//!
//! Bot mode goes through the stateful bot client and supports the inline
//! silence button. Api mode sends plain `sendMessage` calls, splitting long
//! messages into chunks that are each retried on their own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::retry::RetryExecutor;
use crate::clients::http::OutboundCaller;
use crate::clients::telegram::{SendMessage, TelegramBot};
use crate::metrics::MetricsCollector;
use crate::render::TelegramMessage;
use crate::routing::TelegramTarget;
use crate::{Error, Result};

/// Longest text sent in a single api-mode call, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Delivers one rendered message to one telegram target.
#[async_trait]
pub trait TelegramDelivery: Send + Sync {
    /// `receiver` is the metrics label: the alert receiver or splunk route.
    async fn deliver(
        &self,
        target: &TelegramTarget,
        message: &TelegramMessage,
        receiver: &str,
    ) -> Result<()>;
}

/// Splits `text` into pieces of at most `max_len` characters, breaking at the
/// last newline, else the last space, else the last period, else a hard cut.
/// Leading whitespace of each remainder is dropped.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_len {
        let limit = rest
            .char_indices()
            .nth(max_len)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..limit];

        let split_pos = ['\n', ' ', '.']
            .iter()
            .find_map(|&sep| window.rfind(sep).filter(|&pos| pos > 0))
            .unwrap_or(limit);

        chunks.push(rest[..split_pos].to_string());
        rest = rest[split_pos..].trim_start();
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Bot-mode delivery: one retried send, with the silence button when the
/// target asks for it.
pub struct BotModeTelegram {
    bot: Arc<TelegramBot>,
    retry: RetryExecutor,
    metrics: Arc<MetricsCollector>,
}

impl BotModeTelegram {
    pub fn new(bot: Arc<TelegramBot>, retry: RetryExecutor, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            bot,
            retry,
            metrics,
        }
    }
}

#[async_trait]
impl TelegramDelivery for BotModeTelegram {
    async fn deliver(
        &self,
        target: &TelegramTarget,
        message: &TelegramMessage,
        receiver: &str,
    ) -> Result<()> {
        let request = SendMessage {
            chat_id: &target.group_id,
            text: &message.text,
            topic_id: target.topic_id.as_deref(),
            silence_button: target.silencer,
        };

        info!(
            receiver = %receiver,
            chat_id = %target.group_id,
            silencer = target.silencer,
            "Sending telegram alert in bot mode"
        );

        let result = self
            .retry
            .run("telegram send", || {
                self.metrics
                    .record_telegram_attempt(&message.cluster, &message.severity, receiver);
                self.bot.send_message(&request)
            })
            .await;

        result.map_err(|e| {
            self.metrics
                .record_telegram_failure(&message.cluster, &message.severity, receiver);
            Error::delivery(
                "telegram",
                format!(
                    "failed to send message after {} attempts: {}",
                    self.retry.max_retries(),
                    e
                ),
            )
        })
    }
}

/// Api-mode delivery: plain calls, chunked, no button.
pub struct ApiModeTelegram {
    bot: Arc<TelegramBot>,
    caller: OutboundCaller,
    retries: u32,
    delay: Duration,
    metrics: Arc<MetricsCollector>,
}

impl ApiModeTelegram {
    pub fn new(
        bot: Arc<TelegramBot>,
        caller: OutboundCaller,
        retry: RetryExecutor,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            bot,
            caller,
            retries: retry.max_retries(),
            delay: retry.delay(),
            metrics,
        }
    }

    async fn send_chunk(
        &self,
        target: &TelegramTarget,
        chunk: &str,
        message: &TelegramMessage,
        receiver: &str,
    ) -> Result<()> {
        let request = self.bot.send_message_request(&SendMessage {
            chat_id: &target.group_id,
            text: chunk,
            topic_id: target.topic_id.as_deref(),
            silence_button: false,
        });

        for attempt in 1..=self.retries {
            info!(chat_id = %target.group_id, attempt, "Calling Telegram API");
            self.metrics
                .record_telegram_attempt(&message.cluster, &message.severity, receiver);

            // One call per attempt so every attempt is counted above.
            match self.caller.call(&request, 1, self.delay).await {
                Some(response) if response.is_success() => {
                    debug!(status = response.status, "Telegram message sent");
                    return Ok(());
                }
                Some(response) => error!(
                    status = response.status,
                    body = %response.body,
                    "Failed to send telegram message"
                ),
                None => error!("No response was received from Telegram"),
            }

            if attempt < self.retries {
                tokio::time::sleep(self.delay).await;
            }
        }

        self.metrics
            .record_telegram_failure(&message.cluster, &message.severity, receiver);
        Err(Error::delivery(
            "telegram",
            format!("failed to send message after {} attempts", self.retries),
        ))
    }
}

#[async_trait]
impl TelegramDelivery for ApiModeTelegram {
    async fn deliver(
        &self,
        target: &TelegramTarget,
        message: &TelegramMessage,
        receiver: &str,
    ) -> Result<()> {
        if target.silencer {
            warn!(
                receiver = %receiver,
                "Silencer requested but telegram is in api mode, sending without button"
            );
        }

        let length = message.text.chars().count();
        let chunks = if length > MAX_MESSAGE_LENGTH {
            info!(length, limit = MAX_MESSAGE_LENGTH, "Splitting long telegram message");
            split_message(&message.text, MAX_MESSAGE_LENGTH)
        } else {
            vec![message.text.clone()]
        };

        let total = chunks.len();
        let mut failed = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            debug!("Sending message chunk {}/{}", i + 1, total);
            if let Err(e) = self.send_chunk(target, chunk, message, receiver).await {
                error!(chunk = i + 1, total, error = %e, "Telegram chunk failed");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(Error::delivery(
                "telegram",
                format!("{failed} of {total} chunks failed"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http::RequestBody;
    use crate::metrics::Metric;
    use crate::test_support::{Scripted, ScriptedHttp};

    fn target(silencer: bool) -> TelegramTarget {
        TelegramTarget {
            group_id: "-100".to_string(),
            topic_id: None,
            silencer,
        }
    }

    fn message(text: &str) -> TelegramMessage {
        TelegramMessage {
            text: text.to_string(),
            cluster: "prod".to_string(),
            severity: "critical".to_string(),
        }
    }

    fn sent_text(request: &crate::clients::OutboundRequest) -> String {
        match &request.body {
            RequestBody::Json(body) => body["text"].as_str().unwrap_or_default().to_string(),
            _ => String::new(),
        }
    }

    #[test]
    fn test_short_message_is_one_chunk() {
        let text = "a".repeat(10);
        assert_eq!(split_message(&text, 10), vec![text]);
    }

    #[test]
    fn test_split_prefers_newline_then_space_then_period() {
        assert_eq!(
            split_message("aaaa bb\ncc dd", 10),
            vec!["aaaa bb", "cc dd"]
        );
        assert_eq!(split_message("aaaa bbbbbbb", 10), vec!["aaaa", "bbbbbbb"]);
        assert_eq!(split_message("aaaa.bbbbbbb", 10), vec!["aaaa", ".bbbbbbb"]);
        assert_eq!(split_message("abcdefghijkl", 5), vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn test_chunks_respect_limit_and_keep_content() {
        let text = "🔴 disk almost full on node\n".repeat(400);
        let chunks = split_message(&text, MAX_MESSAGE_LENGTH);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_LENGTH));

        let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(squash(&chunks.join("\n")), squash(&text));
    }

    fn api_handler(http: Arc<ScriptedHttp>, metrics: Arc<MetricsCollector>) -> ApiModeTelegram {
        let bot = Arc::new(TelegramBot::new(http.clone(), "https://tg.example", "t"));
        ApiModeTelegram::new(
            bot,
            OutboundCaller::new(http, metrics.clone()),
            RetryExecutor::new(2, Duration::from_secs(1)),
            metrics,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_mode_failed_chunk_does_not_stop_the_rest() {
        let http = Arc::new(ScriptedHttp::new(vec![
            Scripted::Status(500, "{}"),
            Scripted::Status(500, "{}"),
            Scripted::Status(200, "{}"),
        ]));
        let metrics = Arc::new(MetricsCollector::new());
        let handler = api_handler(http.clone(), metrics.clone());

        let text = format!("{}\n{}", "a".repeat(3000), "b".repeat(3000));
        let err = handler
            .deliver(&target(true), &message(&text), "sre")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 of 2 chunks failed"));

        let requests = http.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(sent_text(&requests[2]), "b".repeat(3000));
        let labels = ["prod", "critical", "sre"];
        assert_eq!(metrics.value(Metric::SentTelegramPerReceiver, &labels), 3);
        assert_eq!(metrics.value(Metric::FailedSentTelegramPerReceiver, &labels), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_mode_retries_until_success() {
        let http = Arc::new(ScriptedHttp::new(vec![
            Scripted::Fail("timeout"),
            Scripted::Status(200, "{}"),
        ]));
        let metrics = Arc::new(MetricsCollector::new());
        let start = tokio::time::Instant::now();
        api_handler(http.clone(), metrics.clone())
            .deliver(&target(false), &message("hello"), "sre")
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(
            metrics.value(
                Metric::FailedSentTelegramPerReceiver,
                &["prod", "critical", "sre"]
            ),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_mode_exhaustion() {
        let http = Arc::new(ScriptedHttp::new(vec![
            Scripted::Fail("reset"),
            Scripted::Fail("reset"),
            Scripted::Fail("reset"),
        ]));
        let metrics = Arc::new(MetricsCollector::new());
        let bot = Arc::new(TelegramBot::new(http.clone(), "https://tg.example", "t"));
        let handler = BotModeTelegram::new(
            bot,
            RetryExecutor::new(3, Duration::from_secs(5)),
            metrics.clone(),
        );

        let err = handler
            .deliver(&target(true), &message("hello"), "sre")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Delivery { channel: "telegram", .. }));

        let labels = ["prod", "critical", "sre"];
        assert_eq!(metrics.value(Metric::SentTelegramPerReceiver, &labels), 3);
        assert_eq!(metrics.value(Metric::FailedSentTelegramPerReceiver, &labels), 1);
    }

    #[tokio::test]
    async fn test_bot_mode_sends_silence_button() {
        let http = Arc::new(ScriptedHttp::new(vec![]));
        let bot = Arc::new(TelegramBot::new(http.clone(), "https://tg.example", "t"));
        let handler = BotModeTelegram::new(
            bot,
            RetryExecutor::new(1, Duration::ZERO),
            Arc::new(MetricsCollector::new()),
        );

        handler
            .deliver(&target(true), &message("hello"), "sre")
            .await
            .unwrap();

        let request = &http.requests()[0];
        match &request.body {
            RequestBody::Json(body) => assert!(body.get("reply_markup").is_some()),
            other => panic!("unexpected body {other:?}"),
        }
    }
}
