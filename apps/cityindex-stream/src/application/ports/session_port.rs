//! Session Refresh Port (Driven Port)
//!
//! Obtains a fresh session token when the push server reports the current
//! one expired. The REST client's login implements it.

use async_trait::async_trait;

use crate::domain::session::{Session, SessionError};

/// Port for re-authenticating.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    /// Log in again and return the new session.
    async fn refresh(&self) -> Result<Session, SessionError>;
}
