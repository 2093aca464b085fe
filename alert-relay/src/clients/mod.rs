//! Outbound collaborators: the HTTP seam and the channel/directory clients
//! built on top of it.

pub mod directory;
pub mod http;
pub mod sms;
pub mod telegram;

pub use directory::{GroupNumbers, HttpPhoneDirectory, PhoneDirectory};
pub use http::{
    HttpSend, OutboundCaller, OutboundRequest, OutboundResponse, ReqwestTransport, RequestBody,
    install_rustls_provider,
};
pub use sms::{SmsClient, SmsTransport};
pub use telegram::{SendMessage, TelegramBot};
