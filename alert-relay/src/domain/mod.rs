//! Inbound event shapes, as decoded by the HTTP front end.

mod alert;
mod splunk;

pub use alert::{Alert, AlertEvent, AlertStatus};
pub use splunk::{RAW_BODY_FIELD, SplunkEvent, display_value};
