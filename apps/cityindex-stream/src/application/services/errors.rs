//! Service-level error types.

use std::any::Any;

use crate::domain::streaming::{Category, ChannelKey};

/// Errors surfaced to callers of the streaming client.
///
/// Transport and reconnection failures never appear here; they show up
/// only as connection state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamingError {
    /// The client was stopped.
    #[error("connection pool is closed")]
    PoolClosed,

    /// The client was started outside a tokio runtime.
    #[error("streaming client requires a tokio runtime")]
    NoRuntime,

    /// The subscription key normalized to no item, e.g. an empty market
    /// id list.
    #[error("{0} subscription key names no item")]
    EmptyKey(Category),
}

/// A listener panicked while handling an update.
///
/// Logged and counted; delivery to the other listeners continues.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{category} listener on {key} panicked: {message}")]
pub struct CallbackError {
    /// Category being dispatched.
    pub category: Category,
    /// Channel key being dispatched.
    pub key: ChannelKey,
    /// Panic message, when the payload was a string.
    pub message: String,
}

impl CallbackError {
    /// Build from a `catch_unwind` payload.
    #[must_use]
    pub fn from_panic(category: Category, key: &ChannelKey, payload: &(dyn Any + Send)) -> Self {
        Self {
            category,
            key: key.clone(),
            message: panic_message(payload),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
