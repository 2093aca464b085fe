//! Declarative routing table.
//!
//! The table is loaded from two JSON files (one per inbound source) and is
//! treated as an immutable snapshot once built.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One immutable routing snapshot.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    /// Prometheus destinations, in match-precedence order.
    pub destinations: Vec<Destination>,
    /// Splunk destinations, in match-precedence order.
    pub splunk_destinations: Vec<SplunkDestination>,
}

impl RoutingTable {
    pub fn new(destinations: Vec<Destination>, splunk_destinations: Vec<SplunkDestination>) -> Self {
        Self {
            destinations,
            splunk_destinations,
        }
    }
}

/// Prometheus destination: matched on receiver and severity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Destination {
    pub receiver: String,
    pub severity: String,
    pub types: Vec<ChannelTarget>,
}

/// Splunk destination: matched on the request's route segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SplunkDestination {
    pub subroute: String,
    /// Payload field names to render, in order.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub types: Vec<ChannelTarget>,
}

/// Top-level shape of a routing file.
#[derive(Debug, Deserialize)]
pub(crate) struct RoutingFile<D> {
    pub destinations: Vec<D>,
}

/// Telegram target settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramTarget {
    pub group_id: String,
    pub topic_id: Option<String>,
    pub silencer: bool,
}

/// SMS target settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsTarget {
    pub group_name: String,
    pub sender: Option<String>,
}

/// One channel inside a destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawChannelTarget")]
pub enum ChannelTarget {
    Telegram(TelegramTarget),
    Sms(SmsTarget),
    /// Unrecognised `type`; kept so the file still loads, ignored at dispatch.
    Unknown { kind: String },
}

impl ChannelTarget {
    pub fn kind(&self) -> &str {
        match self {
            Self::Telegram(_) => "telegram",
            Self::Sms(_) => "sms",
            Self::Unknown { kind } => kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawChannelTarget {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, deserialize_with = "string_or_number")]
    telegram_group_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    telegram_topic_id: Option<String>,
    #[serde(default)]
    silencer: bool,
    #[serde(default)]
    keycloak_group_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    sender: Option<String>,
}

impl TryFrom<RawChannelTarget> for ChannelTarget {
    type Error = String;

    fn try_from(raw: RawChannelTarget) -> Result<Self, Self::Error> {
        match raw.kind.trim().to_lowercase().as_str() {
            "telegram" => {
                let group_id = raw
                    .telegram_group_id
                    .ok_or("telegram_group_id not found for type telegram")?;
                Ok(Self::Telegram(TelegramTarget {
                    group_id,
                    topic_id: raw.telegram_topic_id,
                    silencer: raw.silencer,
                }))
            }
            "sms" => {
                let group_name = raw
                    .keycloak_group_name
                    .filter(|name| !name.trim().is_empty())
                    .ok_or("keycloak_group_name not found for type sms")?;
                Ok(Self::Sms(SmsTarget {
                    group_name,
                    sender: raw.sender,
                }))
            }
            _ => Ok(Self::Unknown { kind: raw.kind }),
        }
    }
}

/// Chat ids and sender lines show up both quoted and bare in config files.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prometheus_file() {
        let raw = r#"{
            "destinations": [{
                "receiver": "sre",
                "severity": "critical",
                "types": [
                    {"type": "telegram", "telegram_group_id": -100123, "telegram_topic_id": "7", "silencer": true},
                    {"type": "sms", "keycloak_group_name": "sre-critical"},
                    {"type": "pager"}
                ]
            }]
        }"#;
        let file: RoutingFile<Destination> = serde_json::from_str(raw).unwrap();
        let types = &file.destinations[0].types;
        assert_eq!(
            types[0],
            ChannelTarget::Telegram(TelegramTarget {
                group_id: "-100123".to_string(),
                topic_id: Some("7".to_string()),
                silencer: true,
            })
        );
        assert_eq!(
            types[1],
            ChannelTarget::Sms(SmsTarget {
                group_name: "sre-critical".to_string(),
                sender: None,
            })
        );
        assert_eq!(types[2].kind(), "pager");
    }

    #[test]
    fn test_telegram_requires_group_id() {
        let raw = r#"{"destinations": [{"receiver": "a", "severity": "b", "types": [{"type": "telegram"}]}]}"#;
        let err = serde_json::from_str::<RoutingFile<Destination>>(raw).unwrap_err();
        assert!(err.to_string().contains("telegram_group_id"));
    }

    #[test]
    fn test_missing_required_keys() {
        let missing_destinations = serde_json::from_str::<RoutingFile<Destination>>("{}");
        assert!(missing_destinations.is_err());

        let missing_severity = r#"{"destinations": [{"receiver": "a", "types": []}]}"#;
        assert!(serde_json::from_str::<RoutingFile<Destination>>(missing_severity).is_err());

        let missing_type = r#"{"destinations": [{"receiver": "a", "severity": "b", "types": [{}]}]}"#;
        assert!(serde_json::from_str::<RoutingFile<Destination>>(missing_type).is_err());
    }

    #[test]
    fn test_parse_splunk_file() {
        let raw = r#"{"destinations": [{"subroute": "auth", "keys": ["search_name", "results_link"], "types": [{"type": "sms", "keycloak_group_name": "sec", "sender": 2000}]}]}"#;
        let file: RoutingFile<SplunkDestination> = serde_json::from_str(raw).unwrap();
        let dest = &file.destinations[0];
        assert_eq!(dest.keys, vec!["search_name", "results_link"]);
        assert_eq!(
            dest.types[0],
            ChannelTarget::Sms(SmsTarget {
                group_name: "sec".to_string(),
                sender: Some("2000".to_string()),
            })
        );
    }
}
