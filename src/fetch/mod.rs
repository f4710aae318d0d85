pub mod cache;
pub mod merge;

pub use cache::{CacheKey, CachePolicy, ExpireAfter, NeverExpire, RepositoryCache};
pub use merge::{merge, merge_stream, MergeOptions, MergePolicy, Merged};

use std::sync::Arc;

use futures::future::try_join_all;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::client::{
    paginate, Batch, ClientError, Endpoint, GitHubClient, PullRequestState, RepositoryType,
    RequestSender,
};

/// Lazy sequence of record batches handed to the caller.
pub type BatchStream = BoxStream<'static, Result<Batch, ClientError>>;

/// Three-level GitHub fetch: organizations, their repositories, and the
/// pull requests of those repositories.
///
/// Clones share the request sender (and so its rate limiter) and the
/// repository cache.
#[derive(Clone)]
pub struct Fetcher {
    sender: Arc<dyn RequestSender>,
    base_url: Arc<str>,
    cache: Arc<RepositoryCache>,
    merge_options: MergeOptions,
}

impl Fetcher {
    pub fn new(client: GitHubClient) -> Self {
        let base_url = client.base_url().to_string();
        Self::with_sender(Arc::new(client), base_url)
    }

    /// Build on any [`RequestSender`], e.g. a recorded or throttled one.
    pub fn with_sender(sender: Arc<dyn RequestSender>, base_url: impl Into<String>) -> Self {
        Self {
            sender,
            base_url: Arc::from(base_url.into()),
            cache: Arc::new(RepositoryCache::default()),
            merge_options: MergeOptions::default(),
        }
    }

    pub fn with_merge_options(mut self, options: MergeOptions) -> Self {
        self.merge_options = options;
        self
    }

    pub fn with_cache_policy(mut self, policy: impl CachePolicy + 'static) -> Self {
        self.cache = Arc::new(RepositoryCache::new(policy));
        self
    }

    pub fn cache(&self) -> &RepositoryCache {
        &self.cache
    }

    /// Look organizations up by name, concurrently. Results keep input order.
    #[instrument(skip(self))]
    pub async fn fetch_organizations(&self, names: &[String]) -> Result<Vec<Value>, ClientError> {
        let lookups = names.iter().map(|name| {
            let url = Endpoint::Organization(name).url(&self.base_url);
            let sender = Arc::clone(&self.sender);
            async move {
                let response = sender.send(&url, &[]).await?.error_for_status()?;
                response.json()
            }
        });
        let organizations = try_join_all(lookups).await?;
        debug!(count = organizations.len(), "fetched organizations");
        Ok(organizations)
    }

    /// Repository pages for every organization, merged in arrival order.
    ///
    /// A fully drained sequence is memoized under `(organizations, repo_type)`;
    /// a later call with the same arguments replays it without any requests.
    pub fn fetch_repositories(&self, organizations: &[String], repo_type: RepositoryType) -> BatchStream {
        let key = CacheKey::new(organizations, repo_type);
        if let Some(batches) = self.cache.get(&key) {
            info!(key = %key, batches = batches.len(), "replaying cached repositories");
            return cache::replay(batches);
        }

        let sources: Vec<BatchStream> = organizations
            .iter()
            .map(|org| {
                let url = Endpoint::Repositories(org).url(&self.base_url);
                pages_as_batches(Arc::clone(&self.sender), url, vec![("type", repo_type.to_string())])
            })
            .collect();
        let merged = merge(sources, self.merge_options).boxed();

        cache::record(merged, Arc::clone(&self.cache), key)
    }

    /// Pull request pages for every repository of every organization.
    ///
    /// Each repository batch fans out one paginator per repository as soon as
    /// it arrives; those inner merges run alongside each other and alongside
    /// the repository fetch that feeds them.
    pub fn fetch_pull_requests(
        &self,
        organizations: &[String],
        repo_type: RepositoryType,
        state: PullRequestState,
    ) -> BatchStream {
        let repositories = self.fetch_repositories(organizations, repo_type);
        let this = self.clone();

        let per_batch = repositories
            .map(move |batch| match batch {
                Ok(repositories) => this.pull_requests_for(&repositories, state),
                Err(err) => stream::once(async move { Err(err) }).boxed(),
            })
            .boxed();

        merge_stream(per_batch, self.merge_options).boxed()
    }

    fn pull_requests_for(&self, repositories: &[Value], state: PullRequestState) -> BatchStream {
        let names = match repositories.iter().map(repository_key).collect::<Result<Vec<_>, _>>() {
            Ok(names) => names,
            Err(err) => return stream::once(async move { Err(err) }).boxed(),
        };
        debug!(repositories = names.len(), state = %state, "fanning out pull request fetches");

        let sources: Vec<BatchStream> = names
            .into_iter()
            .map(|full_name| {
                let url = Endpoint::PullRequests(&full_name).url(&self.base_url);
                pages_as_batches(Arc::clone(&self.sender), url, vec![("state", state.to_string())])
            })
            .collect();
        merge(sources, self.merge_options).boxed()
    }
}

/// A repository's `full_name`, used to build its pull request URL.
pub fn repository_key(repository: &Value) -> Result<String, ClientError> {
    repository
        .get("full_name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ClientError::MissingField { field: "full_name" })
}

fn pages_as_batches(
    sender: Arc<dyn RequestSender>,
    url: String,
    params: Vec<(&'static str, String)>,
) -> BatchStream {
    paginate(sender, url, params)
        .map(|page| page.map(|page| page.records))
        .boxed()
}
