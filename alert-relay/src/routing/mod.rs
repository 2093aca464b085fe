//! Routing table, destination matching and the reloadable snapshot cell.

mod resolver;
mod store;
mod table;

pub use resolver::DestinationResolver;
pub use store::{RoutingSource, RoutingStore};
pub use table::{
    ChannelTarget, Destination, RoutingTable, SmsTarget, SplunkDestination, TelegramTarget,
};
