//! Telegram Bot API client.
//!
//! Builds `sendMessage` requests for both delivery modes and, in bot mode,
//! long-polls `getUpdates` to handle the inline "Silence" button.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::http::{HttpSend, OutboundRequest, OutboundResponse};
use crate::{Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Callback data attached to the silence button.
pub const SILENCE_CALLBACK: &str = "alert_confirm";
const SILENCE_BUTTON_TEXT: &str = "💊 Silence";
const SILENCED_MARKER: &str = "\n\n✅ <b>Silenced</b>";

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// One `sendMessage` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub topic_id: Option<&'a str>,
    pub silence_button: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<CallbackMessage>,
}

#[derive(Debug, Deserialize)]
struct CallbackMessage {
    message_id: i64,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Stateless Bot API endpoint builder and caller.
pub struct TelegramBot {
    transport: Arc<dyn HttpSend>,
    base_url: String,
    token: String,
}

impl TelegramBot {
    pub fn new(
        transport: Arc<dyn HttpSend>,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// The `sendMessage` request, HTML parse mode, link previews off.
    pub fn send_message_request(&self, message: &SendMessage<'_>) -> OutboundRequest {
        let mut payload = json!({
            "chat_id": message.chat_id,
            "text": message.text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(topic_id) = message.topic_id {
            payload["message_thread_id"] = json!(topic_id);
        }
        if message.silence_button {
            payload["reply_markup"] = json!({
                "inline_keyboard": [[
                    {"text": SILENCE_BUTTON_TEXT, "callback_data": SILENCE_CALLBACK}
                ]]
            });
        }
        OutboundRequest::post(self.method_url("sendMessage")).json(payload)
    }

    /// Single `sendMessage` call; any non-ok answer is an error.
    pub async fn send_message(&self, message: &SendMessage<'_>) -> Result<()> {
        let response = self
            .transport
            .send(&self.send_message_request(message))
            .await?;
        Self::check::<Value>(response).map(|_| ())
    }

    fn check<T: serde::de::DeserializeOwned>(response: OutboundResponse) -> Result<Option<T>> {
        let parsed: ApiResponse<T> = response.json().map_err(|e| {
            Error::delivery(
                "telegram",
                format!("unreadable response (status {}): {}", response.status, e),
            )
        })?;
        if !response.is_success() || !parsed.ok {
            return Err(Error::delivery(
                "telegram",
                format!(
                    "status {}: {}",
                    response.status,
                    parsed.description.unwrap_or_default()
                ),
            ));
        }
        Ok(parsed.result)
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Option<Value>> {
        let request = OutboundRequest::post(self.method_url(method)).json(payload);
        let response = self.transport.send(&request).await?;
        Self::check(response)
    }

    async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        let request = OutboundRequest::post(self.method_url("getUpdates")).json(payload);
        let response = self.transport.send(&request).await?;
        Ok(Self::check(response)?.unwrap_or_default())
    }

    /// Acknowledges a silence click and marks the message as silenced.
    async fn handle_callback(&self, query: CallbackQuery) -> Result<()> {
        self.call("answerCallbackQuery", json!({"callback_query_id": query.id}))
            .await?;

        if query.data.as_deref() != Some(SILENCE_CALLBACK) {
            return Ok(());
        }
        let Some(message) = query.message else {
            return Ok(());
        };

        // Callback messages carry plain text, so it is escaped before the
        // marker is appended in HTML mode.
        let text = format!(
            "{}{}",
            escape_html(message.text.as_deref().unwrap_or_default()),
            SILENCED_MARKER
        );
        self.call(
            "editMessageText",
            json!({
                "chat_id": message.chat.id,
                "message_id": message.message_id,
                "text": text,
                "parse_mode": "HTML",
            }),
        )
        .await?;
        info!(chat_id = message.chat.id, message_id = message.message_id, "Alert silenced");
        Ok(())
    }

    /// Long-polls for button clicks until `cancel_token` fires. Errors are
    /// logged and never stop the loop.
    pub async fn run_polling(self: Arc<Self>, cancel_token: CancellationToken) {
        info!("Starting Telegram polling...");
        let mut offset = None;

        loop {
            let updates = tokio::select! {
                _ = cancel_token.cancelled() => break,
                updates = self.get_updates(offset) => updates,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        if let Some(query) = update.callback_query
                            && let Err(e) = self.handle_callback(query).await
                        {
                            warn!(error = %e, "Failed to handle telegram callback");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Telegram polling error");
                    tokio::select! {
                        _ = cancel_token.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        debug!("Telegram polling stopped");
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http::RequestBody;
    use crate::test_support::{Scripted, ScriptedHttp};

    fn bot(http: Arc<ScriptedHttp>) -> TelegramBot {
        TelegramBot::new(http, "https://tg.example/", "123:abc")
    }

    fn json_body(request: &OutboundRequest) -> &Value {
        match &request.body {
            RequestBody::Json(body) => body,
            other => panic!("expected json body, got {other:?}"),
        }
    }

    #[test]
    fn test_send_message_request() {
        let bot = bot(Arc::new(ScriptedHttp::new(vec![])));
        let request = bot.send_message_request(&SendMessage {
            chat_id: "-100",
            text: "hi",
            topic_id: Some("7"),
            silence_button: true,
        });
        assert_eq!(request.url, "https://tg.example/bot123:abc/sendMessage");
        let body = json_body(&request);
        assert_eq!(body["chat_id"], "-100");
        assert_eq!(body["message_thread_id"], "7");
        assert_eq!(body["disable_web_page_preview"], true);
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            SILENCE_CALLBACK
        );

        let plain = bot.send_message_request(&SendMessage {
            chat_id: "-100",
            text: "hi",
            topic_id: None,
            silence_button: false,
        });
        assert!(json_body(&plain).get("reply_markup").is_none());
        assert!(json_body(&plain).get("message_thread_id").is_none());
    }

    #[tokio::test]
    async fn test_send_message_rejects_not_ok() {
        let http = Arc::new(ScriptedHttp::new(vec![Scripted::Status(
            400,
            r#"{"ok": false, "description": "Bad Request: chat not found"}"#,
        )]));
        let err = bot(http)
            .send_message(&SendMessage {
                chat_id: "1",
                text: "x",
                topic_id: None,
                silence_button: false,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_polling_silences_message() {
        let http = Arc::new(ScriptedHttp::new(vec![Scripted::Status(
            200,
            r#"{"ok": true, "result": [{
                "update_id": 10,
                "callback_query": {
                    "id": "cb1",
                    "data": "alert_confirm",
                    "message": {"message_id": 5, "chat": {"id": -100}, "text": "CPU < 90"}
                }
            }]}"#,
        )]));
        let bot = Arc::new(bot(http.clone()));
        let token = CancellationToken::new();
        let handle = tokio::spawn(bot.run_polling(token.clone()));

        let mut edited = None;
        for _ in 0..200 {
            edited = http
                .requests()
                .into_iter()
                .find(|r| r.url.ends_with("/editMessageText"));
            if edited.is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        token.cancel();
        handle.await.unwrap();

        let edited = edited.expect("message should be edited");
        let body = json_body(&edited);
        assert_eq!(body["text"], "CPU &lt; 90\n\n✅ <b>Silenced</b>");
        assert_eq!(body["message_id"], 5);

        let requests = http.requests();
        assert!(requests[1].url.ends_with("/answerCallbackQuery"));
        // The next poll acknowledges the handled update.
        let next_poll = requests
            .iter()
            .skip(1)
            .find(|r| r.url.ends_with("/getUpdates"))
            .expect("polling continues");
        assert_eq!(json_body(next_poll)["offset"], 11);
    }
}
