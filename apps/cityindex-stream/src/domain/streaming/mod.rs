//! Streaming Channel Types
//!
//! Identifiers for the push feed: adapter sets (the server-side routing
//! domains a session authenticates against), data adapters, normalized
//! channel keys and the per-connection state machine values.

mod channel;
mod state;

pub use channel::{AdapterSet, Category, ChannelKey, DataAdapter, SubscriptionMode};
pub use state::{ConnectionState, StateSnapshot};
