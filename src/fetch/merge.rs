use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future;
use futures::stream::{self, BoxStream, SelectAll, Stream, StreamExt};
use serde::Deserialize;
use tracing::warn;

use crate::client::ClientError;

/// What a merge does when one of its sources fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Yield the error at once and drop every other source.
    #[default]
    FailFast,
    /// Keep draining the healthy sources, then yield the collected errors last.
    CollectErrors,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub policy: MergePolicy,
    /// Upper bound on sources polled at once. `None` means unbounded.
    pub max_concurrent: Option<usize>,
}

type Source<T> = BoxStream<'static, Result<T, ClientError>>;

/// Interleaves many fallible sources in arrival order.
///
/// Items from one source keep their relative order; nothing is promised
/// across sources. Sources themselves come from a stream, so they can be
/// produced lazily (for example one per upstream batch) and are admitted up
/// to `max_concurrent` at a time.
#[must_use = "streams do nothing unless polled"]
pub struct Merged<T> {
    sources: Option<BoxStream<'static, Source<T>>>,
    active: SelectAll<Source<T>>,
    options: MergeOptions,
    failures: Vec<ClientError>,
    done: bool,
}

/// Merge a fixed set of sources.
pub fn merge<T, I>(sources: I, options: MergeOptions) -> Merged<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = Source<T>>,
    I::IntoIter: Send + 'static,
{
    merge_stream(stream::iter(sources).boxed(), options)
}

/// Merge sources that are themselves produced by a stream.
pub fn merge_stream<T>(sources: BoxStream<'static, Source<T>>, options: MergeOptions) -> Merged<T>
where
    T: Send + 'static,
{
    Merged {
        sources: Some(sources),
        active: SelectAll::new(),
        options,
        failures: Vec::new(),
        done: false,
    }
}

/// End a source right after its first error.
fn until_error<T: Send + 'static>(source: Source<T>) -> Source<T> {
    source
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .boxed()
}

impl<T: Send + 'static> Merged<T> {
    fn has_capacity(&self) -> bool {
        match self.options.max_concurrent {
            Some(limit) => self.active.len() < limit.max(1),
            None => true,
        }
    }

    /// Pull sources while there is room. Returns true when the source stream
    /// is pending, i.e. it has registered the waker and will wake us itself.
    fn admit_sources(&mut self, cx: &mut Context<'_>) -> bool {
        while self.has_capacity() {
            let Some(sources) = self.sources.as_mut() else {
                return false;
            };
            match sources.poll_next_unpin(cx) {
                Poll::Ready(Some(source)) => self.active.push(until_error(source)),
                Poll::Ready(None) => self.sources = None,
                Poll::Pending => return true,
            }
        }
        false
    }

    /// A slot is free and the source stream has not been asked for more yet.
    fn can_refill(&self, sources_pending: bool) -> bool {
        !sources_pending && self.sources.is_some() && self.has_capacity()
    }

    fn finish(&mut self) -> Option<Result<T, ClientError>> {
        self.done = true;
        self.sources = None;
        self.active.clear();

        let mut failures = std::mem::take(&mut self.failures).into_iter();
        let first = failures.next()?;
        let others: Vec<ClientError> = failures.collect();
        if others.is_empty() {
            Some(Err(first))
        } else {
            Some(Err(ClientError::MultipleFailures {
                first: Box::new(first),
                others,
            }))
        }
    }
}

impl<T: Send + 'static> Stream for Merged<T> {
    type Item = Result<T, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            let sources_pending = this.admit_sources(cx);

            match this.active.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(item))) => return Poll::Ready(Some(Ok(item))),
                Poll::Ready(Some(Err(err))) => match this.options.policy {
                    MergePolicy::FailFast => {
                        this.failures.clear();
                        this.failures.push(err);
                        return Poll::Ready(this.finish());
                    }
                    MergePolicy::CollectErrors => {
                        warn!(error = %err, "merged source failed, draining the rest");
                        this.failures.push(err);
                    }
                },
                Poll::Ready(None) => {
                    if this.sources.is_none() {
                        return Poll::Ready(this.finish());
                    }
                    if this.can_refill(sources_pending) {
                        continue;
                    }
                    // No active sources and the source stream is pending.
                    return Poll::Pending;
                }
                // A source that just ended frees its slot; refill it now rather
                // than when a sibling next wakes.
                Poll::Pending if this.can_refill(sources_pending) => continue,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
