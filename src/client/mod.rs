pub mod pagination;
pub mod rate_limit;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use pagination::{next_page_url, paginate, Page, PageStream};
pub use rate_limit::RateLimiter;
pub use types::{
    Batch, Credentials, Endpoint, PullRequestState, QueryParams, RawResponse, RepositoryType,
    RequestBudget,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GitHub API returned {status} for {url}: {body}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Malformed Link header: {header}")]
    Pagination { header: String },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record is missing string field `{field}`")]
    MissingField { field: &'static str },

    #[error("Invalid client setup: {0}")]
    Setup(String),

    #[error("{first} (and {} more failed sources)", .others.len())]
    MultipleFailures {
        first: Box<ClientError>,
        others: Vec<ClientError>,
    },
}

impl RawResponse {
    /// Turn a non-2xx response into [`ClientError::HttpStatus`].
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ClientError::HttpStatus {
                url: self.url,
                status: self.status,
                body: self.body,
            })
        }
    }

    pub fn json(&self) -> Result<serde_json::Value, ClientError> {
        serde_json::from_str(&self.body).map_err(|source| ClientError::Decode {
            url: self.url.clone(),
            source,
        })
    }
}

/// Issues a single GET. Implementations must not retry.
#[async_trait]
pub trait RequestSender: Send + Sync {
    /// Send one request and return the completed exchange, including non-2xx
    /// statuses. Only transport failures are errors.
    async fn send(&self, url: &str, params: &[(&'static str, String)]) -> Result<RawResponse, ClientError>;
}

/// Connection settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
    /// Overrides the budget derived from `credentials`.
    pub budget: Option<RequestBudget>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: types::DEFAULT_BASE_URL.to_string(),
            credentials: Credentials::anonymous(),
            timeout: Duration::from_secs(30),
            budget: None,
        }
    }
}

/// Rate-limited GitHub REST client.
///
/// Cloning is cheap and clones share one [`RateLimiter`], so every request
/// made through any clone counts against the same budget.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
}

impl GitHubClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .default_headers(default_headers(&settings.credentials)?)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ClientError::Setup(e.to_string()))?;
        let budget = settings
            .budget
            .unwrap_or_else(|| RequestBudget::for_credentials(&settings.credentials));

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            limiter: Arc::new(RateLimiter::new(budget)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[async_trait]
impl RequestSender for GitHubClient {
    async fn send(&self, url: &str, params: &[(&'static str, String)]) -> Result<RawResponse, ClientError> {
        self.limiter.acquire().await;
        info!(url = %url, params = ?params, "making request");

        let response = match self.http.get(url).query(params).send().await {
            Ok(response) => response,
            Err(source) => {
                error!(url = %url, error = %source, "request failed");
                return Err(ClientError::Transport {
                    url: url.to_string(),
                    source,
                });
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|source| {
            error!(url = %url, error = %source, "failed to read response body");
            ClientError::Transport {
                url: url.to_string(),
                source,
            }
        })?;

        if !status.is_success() {
            error!(url = %url, status = status.as_u16(), body = %body, "GitHub API returned an error status");
        }

        Ok(RawResponse {
            url: url.to_string(),
            status,
            headers,
            body,
        })
    }
}

fn default_headers(credentials: &Credentials) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(types::ACCEPT_MEDIA_TYPE));
    headers.insert("x-github-api-version", HeaderValue::from_static(types::API_VERSION));
    headers.insert(USER_AGENT, HeaderValue::from_static(types::USER_AGENT));

    if let Some(token) = credentials.token() {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClientError::Setup("access token contains invalid header characters".to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}
