//! In-memory fakes for the outbound seams.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::clients::directory::{GroupNumbers, PhoneDirectory};
use crate::clients::http::{HttpSend, OutboundRequest, OutboundResponse};
use crate::clients::sms::SmsTransport;
use crate::delivery::{SmsDelivery, TelegramDelivery};
use crate::render::{SmsBatch, TelegramMessage};
use crate::routing::{SmsTarget, TelegramTarget};
use crate::{Error, Result};

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    Status(u16, &'static str),
    Fail(&'static str),
}

/// Replays a script, then answers `200 {"ok": true, "result": true}`.
/// Every request is recorded.
pub struct ScriptedHttp {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedHttp {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpSend for ScriptedHttp {
    async fn send(&self, request: &OutboundRequest) -> Result<OutboundResponse> {
        self.requests.lock().push(request.clone());
        match self.script.lock().pop_front() {
            Some(Scripted::Status(status, body)) => Ok(OutboundResponse::new(status, body)),
            Some(Scripted::Fail(reason)) => Err(Error::Other(reason.to_string())),
            None => Ok(OutboundResponse::new(200, r#"{"ok": true, "result": true}"#)),
        }
    }
}

/// Records bulk sends; fails the calls whose 1-based index is listed.
#[derive(Default)]
pub struct RecordingSms {
    pub failing_calls: Vec<usize>,
    sent: Mutex<Vec<(Vec<String>, String, String)>>,
    calls: Mutex<usize>,
}

impl RecordingSms {
    pub fn failing(failing_calls: Vec<usize>) -> Self {
        Self {
            failing_calls,
            ..Default::default()
        }
    }

    /// Successful sends as (recipients, message, sender).
    pub fn sent(&self) -> Vec<(Vec<String>, String, String)> {
        self.sent.lock().clone()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl SmsTransport for RecordingSms {
    async fn send_bulk(&self, recipients: &[String], message: &str, sender: &str) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        if self.failing_calls.contains(&call) {
            return Err(Error::delivery("sms", "provider unavailable"));
        }
        self.sent
            .lock()
            .push((recipients.to_vec(), message.to_string(), sender.to_string()));
        Ok(())
    }
}

/// Fixed directory answer.
pub struct StaticDirectory(pub GroupNumbers);

impl StaticDirectory {
    pub fn with(group: &str, numbers: &str) -> Self {
        let mut map = GroupNumbers::new();
        map.insert(group.to_string(), numbers.to_string());
        Self(map)
    }
}

#[async_trait]
impl PhoneDirectory for StaticDirectory {
    async fn lookup(&self, groups: &[String]) -> Result<GroupNumbers> {
        Ok(self
            .0
            .iter()
            .filter(|(group, _)| groups.contains(group))
            .map(|(g, n)| (g.clone(), n.clone()))
            .collect())
    }
}

/// Records telegram deliveries; fails every delivery to `failing_group`.
#[derive(Default)]
pub struct RecordingTelegram {
    failing_group: Option<String>,
    delivered: Mutex<Vec<(String, String, String)>>,
}

impl RecordingTelegram {
    pub fn failing_for(group_id: &str) -> Self {
        Self {
            failing_group: Some(group_id.to_string()),
            ..Default::default()
        }
    }

    /// Successful deliveries as (group id, receiver).
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered
            .lock()
            .iter()
            .map(|(group, _, receiver)| (group.clone(), receiver.clone()))
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .map(|(_, text, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl TelegramDelivery for RecordingTelegram {
    async fn deliver(
        &self,
        target: &TelegramTarget,
        message: &TelegramMessage,
        receiver: &str,
    ) -> Result<()> {
        if self.failing_group.as_deref() == Some(target.group_id.as_str()) {
            return Err(Error::delivery("telegram", "chat not found"));
        }
        self.delivered.lock().push((
            target.group_id.clone(),
            message.text.clone(),
            receiver.to_string(),
        ));
        Ok(())
    }
}

/// Records SMS batches as handed to the channel.
#[derive(Default)]
pub struct RecordingSmsDelivery {
    batches: Mutex<Vec<SmsBatch>>,
}

impl RecordingSmsDelivery {
    pub fn batches(&self) -> Vec<SmsBatch> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl SmsDelivery for RecordingSmsDelivery {
    async fn deliver(&self, _target: &SmsTarget, batch: &SmsBatch) -> Result<()> {
        self.batches.lock().push(batch.clone());
        Ok(())
    }
}
