//! HTTP client utilities.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, IntoUrl, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::sources::SourceError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Desktop browser user agent; publisher landing pages often refuse library agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Requests per second allowed against one logical provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitBudget {
    pub requests_per_second: f64,
}

impl RateLimitBudget {
    pub fn per_second(requests_per_second: f64) -> Self {
        Self {
            requests_per_second,
        }
    }

    fn quota(&self) -> Result<Quota, SourceError> {
        let rps = self.requests_per_second;
        if !(rps.is_finite() && rps > 0.0) {
            return Err(SourceError::Configuration(format!(
                "Rate limit must be a positive number of requests per second, got {}",
                rps
            )));
        }
        Quota::with_period(Duration::from_secs_f64(1.0 / rps)).ok_or_else(|| {
            SourceError::Configuration(format!("Rate limit of {} rps is too high", rps))
        })
    }
}

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                SourceError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Hand out a client whose requests wait on a fresh limiter for `budget`.
    pub fn rate_limited(&self, budget: RateLimitBudget) -> Result<RateLimitedClient, SourceError> {
        let quota = budget.quota()?;
        Ok(RateLimitedClient {
            client: Arc::clone(&self.client),
            limiter: Arc::new(RateLimiter::direct(quota)),
            budget,
        })
    }
}

/// HTTP client bound to one provider's budget.
///
/// Clones share the limiter, so every task holding a clone draws from the
/// same budget.
#[derive(Clone)]
pub struct RateLimitedClient {
    client: Arc<Client>,
    limiter: Arc<DirectLimiter>,
    budget: RateLimitBudget,
}

impl fmt::Debug for RateLimitedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedClient")
            .field("budget", &self.budget)
            .finish()
    }
}

impl RateLimitedClient {
    /// Wait until the budget allows one more request.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RateLimitedRequestBuilder {
        RateLimitedRequestBuilder {
            builder: self.client.get(url),
            limiter: Arc::clone(&self.limiter),
        }
    }

    pub fn budget(&self) -> RateLimitBudget {
        self.budget
    }
}

/// Request builder whose `send` first takes a permit from the limiter.
pub struct RateLimitedRequestBuilder {
    builder: RequestBuilder,
    limiter: Arc<DirectLimiter>,
}

impl RateLimitedRequestBuilder {
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        self.builder = self.builder.query(query);
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.builder = self.builder.header(key, value);
        self
    }

    pub async fn send(self) -> Result<Response, SourceError> {
        self.limiter.until_ready().await;
        Ok(self.builder.send().await?)
    }
}

/// Turn a non-success status into [`SourceError::Api`].
pub fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SourceError::Api(format!(
            "{} returned status {}",
            response.url(),
            status
        )))
    }
}
