//! REST client for the trading API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::OnceCell;

use super::error::RestError;
use super::types::{
    AccountResponse, BarInterval, LoginResponse, MarketTag, MarketsResponse, TagLookupResponse,
    TagSearch, flatten_tags,
};
use super::wcf::rewrite_wcf_dates;
use crate::application::ports::SessionRefresher;
use crate::domain::session::{Session, SessionError};
use crate::infrastructure::config::{ClientConfig, Credentials};
use crate::infrastructure::metrics;
use crate::infrastructure::rate_limit::LeakyBucket;

/// Trading API client.
///
/// Requests made after [`Self::login`] carry the `UserName` and `Session`
/// headers. Every request first takes a token from the rate limiter.
///
/// # Example
///
/// ```ignore
/// use cityindex_stream::infrastructure::config::ClientConfig;
/// use cityindex_stream::infrastructure::rest::RestClient;
///
/// let client = RestClient::from_config(&ClientConfig::from_env()?)?;
/// let session = client.login().await?;
/// let markets = client.list_cfd_markets(Some("Wall Street"), None, 20).await?;
/// ```
pub struct RestClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
    session_id: RwLock<Option<String>>,
    client_account_id: OnceCell<u64>,
    limiter: Arc<LeakyBucket>,
}

impl RestClient {
    /// Create a client against `base_url`.
    ///
    /// # Errors
    ///
    /// Fails if the URL does not parse or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        limiter: Arc<LeakyBucket>,
        timeout: Duration,
    ) -> Result<Self, RestError> {
        // Relative paths join under the base only when it ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized).map_err(|e| RestError::InvalidUrl {
            url: normalized.clone(),
            message: e.to_string(),
        })?;

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            credentials,
            session_id: RwLock::new(None),
            client_account_id: OnceCell::new(),
            limiter,
        })
    }

    /// Create a client from configuration, with its own rate limiter.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Config`] for rate limit settings that would
    /// stall every request; otherwise see [`Self::new`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, RestError> {
        config.rate_limit.validate()?;
        let limiter = Arc::new(LeakyBucket::new(
            config.rate_limit.capacity,
            config.rate_limit.per_second,
        ));
        Self::new(
            config.api_url(),
            config.credentials.clone(),
            limiter,
            config.http_timeout,
        )
    }

    /// Log in and remember the session token for later calls.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Http`] when the credentials are refused.
    pub async fn login(&self) -> Result<Session, RestError> {
        let body = json!({
            "UserName": self.credentials.username(),
            "Password": self.credentials.password(),
        });
        let response: LoginResponse = self
            .send(self.request(Method::POST, "session")?.json(&body))
            .await?;

        *self.session_id.write() = Some(response.session.clone());
        tracing::info!(username = self.credentials.username(), "Logged in");
        Ok(Session::new(self.credentials.username(), response.session))
    }

    /// Current session, if logged in.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session_id
            .read()
            .as_ref()
            .map(|id| Session::new(self.credentials.username(), id.clone()))
    }

    /// Client account id of the logged-in user. Fetched once, then cached.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotLoggedIn`] before [`Self::login`]; otherwise
    /// propagates request failures.
    pub async fn client_account_id(&self) -> Result<u64, RestError> {
        if self.session_id.read().is_none() {
            return Err(RestError::NotLoggedIn);
        }
        self.client_account_id
            .get_or_try_init(|| async {
                let response: AccountResponse = self
                    .get("useraccount/UserAccount/ClientAndTradingAccount", &[])
                    .await?;
                Ok::<_, RestError>(response.client_account_id)
            })
            .await
            .copied()
    }

    /// Search CFD markets by code and name.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn market_search(&self, query: &str) -> Result<Value, RestError> {
        let account = self.client_account_id().await?;
        self.get(
            "market/search",
            &[
                ("clientAccountId", account.to_string()),
                ("searchByMarketCode", "true".to_string()),
                ("searchByMarketName", "true".to_string()),
                ("spreadProductType", "false".to_string()),
                ("cfdProductType", "true".to_string()),
                ("binaryProductType", "false".to_string()),
                ("query", query.to_string()),
                ("maxResults", "1000".to_string()),
                ("useMobileShortName", "false".to_string()),
            ],
        )
        .await
    }

    /// Every market tag, parents followed by their children.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn tag_lookup(&self) -> Result<Vec<MarketTag>, RestError> {
        let response: TagLookupResponse = self.get("market/taglookup", &[]).await?;
        Ok(flatten_tags(response.tags))
    }

    /// Markets matching a query and/or tag.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn search_with_tags(&self, search: &TagSearch) -> Result<Vec<Value>, RestError> {
        let response: MarketsResponse = self
            .get("market/searchwithtags", &search.to_query())
            .await?;
        Ok(response.markets)
    }

    /// Static information for one market.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn market_info(&self, market_id: u64) -> Result<Value, RestError> {
        self.get(&format!("market/{market_id}/information"), &[])
            .await
    }

    /// Recent price bars for one market.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn market_bars(
        &self,
        market_id: u64,
        interval: BarInterval,
        span: u32,
        bars: u32,
    ) -> Result<Value, RestError> {
        self.get(
            &format!("market/{market_id}/barhistory"),
            &[
                ("interval", interval.as_str().to_string()),
                ("span", span.to_string()),
                ("PriceBars", bars.to_string()),
            ],
        )
        .await
    }

    /// Latest headlines.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn headlines(&self) -> Result<Value, RestError> {
        self.get("news/headlines", &[]).await
    }

    /// Headlines from one source and category.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn headlines_with_source(
        &self,
        source: &str,
        category: &str,
        max_results: u32,
    ) -> Result<Value, RestError> {
        self.get(
            &format!("news/{source}/{category}"),
            &[("MaxResults", max_results.to_string())],
        )
        .await
    }

    /// CFD markets by name and/or code.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn list_cfd_markets(
        &self,
        name: Option<&str>,
        code: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<Value>, RestError> {
        let account = self.client_account_id().await?;
        let response: MarketsResponse = self
            .get(
                "cfd/markets",
                &[
                    ("MarketName", name.unwrap_or_default().to_string()),
                    ("MarketCode", code.unwrap_or_default().to_string()),
                    ("ClientAccountId", account.to_string()),
                    ("MaxResults", max_results.to_string()),
                ],
            )
            .await?;
        Ok(response.markets)
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RestError> {
        let mut builder = self.request(Method::GET, path)?;
        if !query.is_empty() {
            builder = builder.query(query);
        }
        self.send(builder).await
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RestError> {
        let url = self.base_url.join(path).map_err(|e| RestError::InvalidUrl {
            url: format!("{}{path}", self.base_url),
            message: e.to_string(),
        })?;

        let mut builder = self.http.request(method, url);
        if let Some(session_id) = self.session_id.read().as_deref() {
            builder = builder
                .header("UserName", self.credentials.username())
                .header("Session", session_id);
        }
        Ok(builder)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RestError> {
        self.limiter.acquire().await;

        let request = builder.build()?;
        let method = request.method().clone();
        tracing::debug!(method = %method, url = %request.url(), "Trading API request");

        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_rest_request(method.as_str(), 0);
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_rest_request(method.as_str(), status.as_u16());
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(method = %method, status = status.as_u16(), "Trading API error");
            return Err(RestError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = rewrite_wcf_dates(&body);
        serde_json::from_str(&body).map_err(|source| RestError::Decode {
            source,
            body: body.into_owned(),
        })
    }
}

#[async_trait]
impl SessionRefresher for RestClient {
    async fn refresh(&self) -> Result<Session, SessionError> {
        Ok(self.login().await?)
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url.as_str())
            .field("credentials", &self.credentials)
            .field("logged_in", &self.session_id.read().is_some())
            .finish_non_exhaustive()
    }
}
