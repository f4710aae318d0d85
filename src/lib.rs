//! Rate-limited, paginated GitHub fetcher for organizations, their
//! repositories, and those repositories' pull requests.
//!
//! Every request goes through one shared sliding-window [`client::RateLimiter`].
//! Paginated endpoints are exposed as lazy streams of record batches, and the
//! per-organization and per-repository streams are merged in arrival order.

pub mod client;
pub mod config;
pub mod fetch;
pub mod report;
pub mod resync;

pub use client::{ClientError, GitHubClient, PullRequestState, RepositoryType};
pub use fetch::{BatchStream, Fetcher};
pub use resync::{ResourceConfig, ResourceKind, Resyncer};
