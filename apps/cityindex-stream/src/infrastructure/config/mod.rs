//! Configuration Module
//!
//! Environment-driven configuration for the REST client and streaming layer.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, Credentials, Environment, LIVE_API_URL, LIVE_STREAM_URL,
    RateLimitSettings, StreamSettings, TEST_API_URL, TEST_STREAM_URL,
};
