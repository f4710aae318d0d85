use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::client::{Batch, RepositoryType};

use super::BatchStream;

/// Decides whether a stored entry may still be replayed.
pub trait CachePolicy: Send + Sync + fmt::Debug {
    fn is_fresh(&self, age: Duration) -> bool;
}

/// Entries stay valid for the life of the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpire;

impl CachePolicy for NeverExpire {
    fn is_fresh(&self, _age: Duration) -> bool {
        true
    }
}

/// Entries expire once they are older than the wrapped duration.
#[derive(Debug, Clone, Copy)]
pub struct ExpireAfter(pub Duration);

impl CachePolicy for ExpireAfter {
    fn is_fresh(&self, age: Duration) -> bool {
        age < self.0
    }
}

/// Exact `(organizations, repo_type)` a repository fetch was made with.
/// Organization order is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub organizations: Vec<String>,
    pub repo_type: RepositoryType,
}

impl CacheKey {
    pub fn new(organizations: &[String], repo_type: RepositoryType) -> Self {
        Self {
            organizations: organizations.to_vec(),
            repo_type,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?type={}", self.organizations.join(","), self.repo_type)
    }
}

struct Entry {
    stored_at: Instant,
    batches: Arc<Vec<Batch>>,
}

/// Memoized repository batch sequences.
pub struct RepositoryCache {
    policy: Box<dyn CachePolicy>,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl fmt::Debug for RepositoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryCache")
            .field("policy", &self.policy)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for RepositoryCache {
    fn default() -> Self {
        Self::new(NeverExpire)
    }
}

impl RepositoryCache {
    pub fn new(policy: impl CachePolicy + 'static) -> Self {
        Self {
            policy: Box::new(policy),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Batches recorded for `key`, if present and fresh. Stale entries are dropped.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Batch>>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        if self.policy.is_fresh(entry.stored_at.elapsed()) {
            return Some(Arc::clone(&entry.batches));
        }
        debug!(key = %key, "cached repositories expired");
        entries.remove(key);
        None
    }

    pub fn store(&self, key: CacheKey, batches: Vec<Batch>) {
        debug!(key = %key, batches = batches.len(), "caching repository batches");
        let entry = Entry {
            stored_at: Instant::now(),
            batches: Arc::new(batches),
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, entry);
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replay stored batches without touching the network.
pub(crate) fn replay(batches: Arc<Vec<Batch>>) -> BatchStream {
    let count = batches.len();
    stream::iter((0..count).map(move |i| Ok(batches[i].clone()))).boxed()
}

/// Pass batches through and store the full sequence once `inner` ends cleanly.
///
/// Nothing is stored if `inner` fails or the consumer stops early.
pub(crate) fn record(inner: BatchStream, cache: Arc<RepositoryCache>, key: CacheKey) -> BatchStream {
    struct Recording {
        inner: BatchStream,
        seen: Vec<Batch>,
        cache: Arc<RepositoryCache>,
        key: CacheKey,
    }

    let start = Recording {
        inner,
        seen: Vec::new(),
        cache,
        key,
    };

    stream::unfold(Some(start), |state| async move {
        let mut state = state?;
        match state.inner.next().await {
            Some(Ok(batch)) => {
                state.seen.push(batch.clone());
                Some((Ok(batch), Some(state)))
            }
            Some(Err(err)) => Some((Err(err), None)),
            None => {
                state.cache.store(state.key, state.seen);
                None
            }
        }
    })
    .boxed()
}
