use std::fmt;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;

/// Public GitHub REST API host.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Value sent in the `X-GitHub-Api-Version` header.
pub const API_VERSION: &str = "2022-11-28";

/// Media type sent in the `Accept` header.
pub const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github+json";

pub const USER_AGENT: &str = "github-resync";

/// Requests per hour GitHub grants a token-authenticated client.
pub const REQUEST_LIMIT_AUTHENTICATED: u32 = 5000;

/// Requests per hour GitHub grants an anonymous client.
pub const REQUEST_LIMIT_UNAUTHENTICATED: u32 = 60;

/// Query parameters attached to a single request.
pub type QueryParams = Vec<(&'static str, String)>;

/// One page's worth of JSON records.
pub type Batch = Vec<serde_json::Value>;

/// Optional bearer token. Its presence selects the rate budget tier.
#[derive(Clone, Default)]
pub struct Credentials {
    token: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.token.is_some() { "Some(***)" } else { "None" };
        f.debug_struct("Credentials").field("token", &shown).finish()
    }
}

/// At most `max_requests` acquisitions within any sliding `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestBudget {
    pub max_requests: u32,
    pub window: Duration,
}

impl RequestBudget {
    /// A zero request count is clamped to one so acquisitions can always make progress.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
        }
    }

    /// GitHub's hourly budget for the given credentials.
    pub fn for_credentials(credentials: &Credentials) -> Self {
        let limit = if credentials.is_authenticated() {
            REQUEST_LIMIT_AUTHENTICATED
        } else {
            REQUEST_LIMIT_UNAUTHENTICATED
        };
        Self::new(limit, Duration::from_secs(60 * 60))
    }
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// Repository filter accepted by `GET /orgs/{org}/repos`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryType {
    #[default]
    All,
    Public,
    Private,
    Forks,
    Sources,
    Member,
}

impl RepositoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryType::All => "all",
            RepositoryType::Public => "public",
            RepositoryType::Private => "private",
            RepositoryType::Forks => "forks",
            RepositoryType::Sources => "sources",
            RepositoryType::Member => "member",
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pull request filter accepted by `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    #[default]
    Open,
    Closed,
    All,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestState::Open => "open",
            PullRequestState::Closed => "closed",
            PullRequestState::All => "all",
        }
    }
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three logical endpoints this client talks to.
#[derive(Debug, Clone, Copy)]
pub enum Endpoint<'a> {
    /// `orgs/{login}`
    Organization(&'a str),
    /// `orgs/{login}/repos`
    Repositories(&'a str),
    /// `repos/{full_name}/pulls`
    PullRequests(&'a str),
}

impl Endpoint<'_> {
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            Endpoint::Organization(org) => format!("{base}/orgs/{org}"),
            Endpoint::Repositories(org) => format!("{base}/orgs/{org}/repos"),
            Endpoint::PullRequests(full_name) => format!("{base}/repos/{full_name}/pulls"),
        }
    }
}
