//! Authenticated session identity.

use std::fmt;

use thiserror::Error;

/// Username plus the server-issued session token.
///
/// Required to open any push connection; replaced when the server reports
/// the token expired.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
    session_id: String,
}

impl Session {
    /// Create a session.
    #[must_use]
    pub fn new(username: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            session_id: session_id.into(),
        }
    }

    /// Account username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Session token.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("session_id", &"[REDACTED]")
            .finish()
    }
}

/// Failure obtaining a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Server rejected the credentials.
    #[error("login rejected: {0}")]
    Rejected(String),

    /// Login request could not be completed.
    #[error("login request failed: {0}")]
    Request(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_session_id() {
        let session = Session::new("DM123", "secret-token");
        let debug = format!("{session:?}");

        assert!(debug.contains("DM123"));
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
