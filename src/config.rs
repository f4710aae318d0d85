use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::client::{types::DEFAULT_BASE_URL, ClientSettings, Credentials, RequestBudget};
use crate::fetch::{MergeOptions, MergePolicy};
use crate::resync::ResourceConfig;

pub const DEFAULT_CONFIG_FILE: &str = ".github-resync.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Budget override needs both max_requests and window_secs")]
    IncompleteBudget,
}

/// Top-level configuration loaded from .github-resync.toml.
/// Every field is optional; an empty file resyncs nothing against the public API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    /// Resources to resync, in order.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides GitHub's hourly budget when set together with `window_secs`.
    pub max_requests: Option<u32>,
    pub window_secs: Option<u64>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
            max_requests: None,
            window_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub merge_policy: MergePolicy,

    /// Most paginators one merge drives at once. Unbounded when unset.
    pub max_concurrent_sources: Option<usize>,

    /// How long memoized repository results stay valid. Forever when unset.
    pub cache_ttl_secs: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from .github-resync.toml in the current directory.
    /// Returns default config if the file doesn't exist. The token is
    /// resolved later by [`Config::github_token`].
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|token| !token.trim().is_empty())
    }

    pub fn client_settings(&self) -> Result<ClientSettings, ConfigError> {
        let credentials = match self.github_token() {
            Some(token) => Credentials::bearer(token),
            None => Credentials::anonymous(),
        };
        let budget = match (self.github.max_requests, self.github.window_secs) {
            (Some(max), Some(secs)) => Some(RequestBudget::new(max, Duration::from_secs(secs))),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteBudget),
        };

        Ok(ClientSettings {
            base_url: self.github.base_url.clone(),
            credentials,
            timeout: Duration::from_secs(self.github.timeout_secs),
            budget,
        })
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            policy: self.fetch.merge_policy,
            max_concurrent: self.fetch.max_concurrent_sources,
        }
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.fetch.cache_ttl_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{PullRequestState, RepositoryType};
    use crate::resync::ResourceKind;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.github.timeout_secs, 30);
        assert_eq!(config.fetch.merge_policy, MergePolicy::FailFast);
        assert!(config.resources.is_empty());
        assert!(config.cache_ttl().is_none());
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[github]
base_url = "https://ghe.example.com/api/v3"
timeout_secs = 10
max_requests = 100
window_secs = 60

[fetch]
merge_policy = "collect_errors"
max_concurrent_sources = 8
cache_ttl_secs = 600

[[resources]]
kind = "organization"
[resources.selector]
organizations = ["acme"]

[[resources]]
kind = "repository"
[resources.selector]
organizations = ["acme", "initech"]
type = "sources"

[[resources]]
kind = "pull_request"
[resources.selector]
organizations = ["acme"]
repositoryType = "public"
state = "closed"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.resources.len(), 3);
        assert_eq!(config.resources[1].kind(), ResourceKind::Repository);
        match &config.resources[2] {
            ResourceConfig::PullRequest { selector } => {
                assert_eq!(selector.repo_type, RepositoryType::Public);
                assert_eq!(selector.state, PullRequestState::Closed);
            }
            other => panic!("unexpected resource: {other:?}"),
        }

        let options = config.merge_options();
        assert_eq!(options.policy, MergePolicy::CollectErrors);
        assert_eq!(options.max_concurrent, Some(8));
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(600)));

        let settings = config.client_settings().unwrap();
        assert_eq!(settings.base_url, "https://ghe.example.com/api/v3");
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.budget, Some(RequestBudget::new(100, Duration::from_secs(60))));
    }

    #[test]
    fn test_half_budget_override_rejected() {
        let config: Config = toml::from_str("[github]\nmax_requests = 10\n").unwrap();
        assert!(matches!(config.client_settings(), Err(ConfigError::IncompleteBudget)));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let parsed: Result<Config, _> = toml::from_str(
            "[[resources]]\nkind = \"issue\"\n[resources.selector]\norganizations = []\n",
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("github_resync_config_test.toml");
        std::fs::write(&path, "[github]\ntoken = \"from-file\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.github_token().as_deref(), Some("from-file"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_file_values_are_kept_as_written() {
        let path = std::env::temp_dir().join("github_resync_config_no_token.toml");
        std::fs::write(&path, "[github]\ntimeout_secs = 5\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(config.github.token.is_none());
        assert_eq!(config.github.timeout_secs, 5);
    }

    #[test]
    fn test_blank_token_means_anonymous() {
        let config: Config = toml::from_str("[github]\ntoken = \"  \"\n").unwrap();
        assert!(config.github_token().is_none());
    }
}
