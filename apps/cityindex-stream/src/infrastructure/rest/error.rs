//! REST client errors.

use crate::domain::session::SessionError;
use crate::infrastructure::config::ConfigError;

/// Failure calling the trading API.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Request could not be sent or the body not read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Body was not the expected JSON.
    #[error("invalid response body: {source}")]
    Decode {
        /// Parser error.
        #[source]
        source: serde_json::Error,
        /// Body after date rewriting.
        body: String,
    },

    /// An authenticated call was made before `login`.
    #[error("not logged in")]
    NotLoggedIn,

    /// Base URL could not be parsed.
    #[error("invalid base URL {url}: {message}")]
    InvalidUrl {
        /// URL given.
        url: String,
        /// Parser message.
        message: String,
    },

    /// Client configuration is out of range.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl RestError {
    /// True for 401 and 403 responses.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }
}

impl From<RestError> for SessionError {
    fn from(e: RestError) -> Self {
        match e {
            RestError::Http {
                status: 401 | 403,
                body,
            } => Self::Rejected(body),
            other => Self::Request(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_become_rejections() {
        let err = RestError::Http {
            status: 401,
            body: "bad password".to_string(),
        };
        assert!(err.is_auth_failure());
        assert!(matches!(SessionError::from(err), SessionError::Rejected(body) if body == "bad password"));
    }

    #[test]
    fn other_failures_become_request_errors() {
        let err = RestError::Http {
            status: 503,
            body: String::new(),
        };
        assert!(!err.is_auth_failure());
        assert!(matches!(SessionError::from(err), SessionError::Request(_)));
        assert!(matches!(
            SessionError::from(RestError::NotLoggedIn),
            SessionError::Request(_)
        ));
    }
}
