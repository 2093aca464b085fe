//! Phone directory lookup.
//!
//! The directory answers `{group: "n1,n2,..."}` for the requested groups.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::http::{OutboundCaller, OutboundRequest};
use crate::{Error, Result};

const LOOKUP_RETRIES: u32 = 3;
const LOOKUP_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Group name to delimited number string.
pub type GroupNumbers = BTreeMap<String, String>;

#[async_trait]
pub trait PhoneDirectory: Send + Sync {
    async fn lookup(&self, groups: &[String]) -> Result<GroupNumbers>;
}

/// HTTP directory: `GET {url}{route}` with body `{"receivers": [...]}`.
pub struct HttpPhoneDirectory {
    caller: OutboundCaller,
    endpoint: String,
}

impl HttpPhoneDirectory {
    pub fn new(caller: OutboundCaller, url: &str, route: &str) -> Self {
        Self {
            caller,
            endpoint: format!("{url}{route}"),
        }
    }
}

#[async_trait]
impl PhoneDirectory for HttpPhoneDirectory {
    async fn lookup(&self, groups: &[String]) -> Result<GroupNumbers> {
        info!(groups = ?groups, "Calling phone directory");
        let request = OutboundRequest::get(&self.endpoint)
            .header("Accept", "application/json")
            .json(json!({ "receivers": groups }));

        let response = self
            .caller
            .call(&request, LOOKUP_RETRIES, LOOKUP_RETRY_INTERVAL)
            .await
            .ok_or_else(|| Error::Directory("no response from phone directory".to_string()))?;

        if response.status >= 400 {
            return Err(Error::Directory(format!(
                "phone directory answered {}",
                response.status
            )));
        }

        let body: BTreeMap<String, Value> = response
            .json()
            .map_err(|e| Error::Directory(format!("unreadable directory response: {e}")))?;
        debug!(body = ?body, "Phone directory response");

        // Non-string values carry no numbers.
        Ok(body
            .into_iter()
            .filter_map(|(group, numbers)| match numbers {
                Value::String(numbers) => Some((group, numbers)),
                _ => None,
            })
            .collect())
    }
}
