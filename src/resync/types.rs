use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::client::{PullRequestState, RepositoryType};

use super::ResyncError;

/// Resource kinds the ingestion host can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ResourceKind {
    Organization,
    Repository,
    PullRequest,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Organization,
        ResourceKind::Repository,
        ResourceKind::PullRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Organization => "organization",
            ResourceKind::Repository => "repository",
            ResourceKind::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ResyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ResyncError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrganizationSelector {
    #[serde(default)]
    pub organizations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepositorySelector {
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(rename = "type", default)]
    pub repo_type: RepositoryType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullRequestSelector {
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(rename = "type", alias = "repositoryType", default)]
    pub repo_type: RepositoryType,
    #[serde(default)]
    pub state: PullRequestState,
}

/// One configured resource: its kind plus the matching selector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceConfig {
    Organization { selector: OrganizationSelector },
    Repository { selector: RepositorySelector },
    PullRequest { selector: PullRequestSelector },
}

impl ResourceConfig {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceConfig::Organization { .. } => ResourceKind::Organization,
            ResourceConfig::Repository { .. } => ResourceKind::Repository,
            ResourceConfig::PullRequest { .. } => ResourceKind::PullRequest,
        }
    }

    pub fn organizations(&self) -> &[String] {
        match self {
            ResourceConfig::Organization { selector } => &selector.organizations,
            ResourceConfig::Repository { selector } => &selector.organizations,
            ResourceConfig::PullRequest { selector } => &selector.organizations,
        }
    }

    /// Build the resource for `kind` from loose selector values.
    pub fn from_parts(
        kind: ResourceKind,
        organizations: Vec<String>,
        repo_type: RepositoryType,
        state: PullRequestState,
    ) -> Self {
        match kind {
            ResourceKind::Organization => ResourceConfig::Organization {
                selector: OrganizationSelector { organizations },
            },
            ResourceKind::Repository => ResourceConfig::Repository {
                selector: RepositorySelector {
                    organizations,
                    repo_type,
                },
            },
            ResourceKind::PullRequest => ResourceConfig::PullRequest {
                selector: PullRequestSelector {
                    organizations,
                    repo_type,
                    state,
                },
            },
        }
    }
}
