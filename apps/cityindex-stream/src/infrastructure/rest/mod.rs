//! Trading API REST Client
//!
//! Authenticated JSON calls against the trading API. Every request takes a
//! token from the shared [`LeakyBucket`](crate::infrastructure::rate_limit::LeakyBucket)
//! first; response bodies have their WCF dates rewritten before parsing.

mod client;
mod error;
mod types;
mod wcf;

pub use client::RestClient;
pub use error::RestError;
pub use types::{BarInterval, MarketTag, TagSearch};
pub use wcf::rewrite_wcf_dates;
