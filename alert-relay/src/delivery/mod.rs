//! Channel handlers, retry and per-destination fan-out.

pub mod dispatcher;
pub mod recipients;
pub mod retry;
pub mod sms;
pub mod telegram;

pub use dispatcher::{ChannelDispatcher, DispatchSummary};
pub use recipients::{RecipientResolver, dedupe_filter, is_valid_number};
pub use retry::RetryExecutor;
pub use sms::{SmsDelivery, SmsHandler};
pub use telegram::{
    ApiModeTelegram, BotModeTelegram, MAX_MESSAGE_LENGTH, TelegramDelivery, split_message,
};
