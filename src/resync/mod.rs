pub mod types;

pub use types::{
    OrganizationSelector, PullRequestSelector, RepositorySelector, ResourceConfig, ResourceKind,
};

use futures::stream::{self, AbortHandle, Abortable, StreamExt};
use thiserror::Error;
use tracing::info;

use crate::fetch::{BatchStream, Fetcher};

#[derive(Debug, Error)]
pub enum ResyncError {
    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),
}

/// Maps each configured resource to the fetch operation for its kind.
#[derive(Clone)]
pub struct Resyncer {
    fetcher: Fetcher,
}

impl Resyncer {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Start a resync for one resource. Nothing is requested until the
    /// returned stream is polled.
    pub fn resync(&self, resource: &ResourceConfig) -> BatchStream {
        let kind = resource.kind();
        let batches = match resource {
            ResourceConfig::Organization { selector } => {
                info!(organizations = ?selector.organizations, "retrieving organizations");
                self.organizations(selector)
            }
            ResourceConfig::Repository { selector } => {
                info!(
                    repo_type = %selector.repo_type,
                    organizations = ?selector.organizations,
                    "retrieving repositories"
                );
                self.fetcher
                    .fetch_repositories(&selector.organizations, selector.repo_type)
            }
            ResourceConfig::PullRequest { selector } => {
                info!(
                    state = %selector.state,
                    organizations = ?selector.organizations,
                    "retrieving pull requests"
                );
                self.fetcher.fetch_pull_requests(
                    &selector.organizations,
                    selector.repo_type,
                    selector.state,
                )
            }
        };

        batches
            .inspect(move |batch| {
                if let Ok(batch) = batch {
                    info!(kind = %kind, size = batch.len(), "retrieved batch");
                }
            })
            .boxed()
    }

    /// Organizations are not paginated, so they come back as one batch, or
    /// none at all for an empty selector.
    fn organizations(&self, selector: &OrganizationSelector) -> BatchStream {
        if selector.organizations.is_empty() {
            return stream::empty().boxed();
        }
        let fetcher = self.fetcher.clone();
        let names = selector.organizations.clone();
        stream::once(async move { fetcher.fetch_organizations(&names).await }).boxed()
    }
}

/// Wrap `batches` so it can be stopped from elsewhere. After
/// [`AbortHandle::abort`] the stream ends at its next poll and no further
/// request is made.
pub fn cancellable(batches: BatchStream) -> (Abortable<BatchStream>, AbortHandle) {
    stream::abortable(batches)
}
