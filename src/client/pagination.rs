use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, LINK};
use tracing::{debug, instrument};

use super::types::{Batch, QueryParams, RawResponse};
use super::{ClientError, RequestSender};

/// A page of records plus the URL of the page after it.
///
/// `next` is `None` exactly when this is the last page of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Batch,
    pub next: Option<String>,
}

/// Lazy sequence of pages for one starting URL.
pub type PageStream = BoxStream<'static, Result<Page, ClientError>>;

/// Extract the `rel="next"` target from a `Link` header.
///
/// Returns `Ok(None)` when the header is absent or names no next page.
/// An entry without the `;` separator is an error carrying the raw header.
pub fn next_page_url(headers: &HeaderMap) -> Result<Option<String>, ClientError> {
    let Some(value) = headers.get(LINK) else {
        return Ok(None);
    };
    let raw = value.to_str().map_err(|_| ClientError::Pagination {
        header: String::from_utf8_lossy(value.as_bytes()).into_owned(),
    })?;
    if raw.trim().is_empty() {
        return Ok(None);
    }

    for entry in raw.split(',') {
        let (target, rel) = entry.split_once(';').ok_or_else(|| ClientError::Pagination {
            header: raw.to_string(),
        })?;
        if rel.contains("next") {
            let url = target.trim().trim_matches(|c| c == '<' || c == '>' || c == ' ');
            return Ok(Some(url.to_string()));
        }
    }

    Ok(None)
}

/// Decode a paginated response into a [`Page`].
pub fn parse_page(response: RawResponse) -> Result<Page, ClientError> {
    let response = response.error_for_status()?;
    let next = next_page_url(&response.headers)?;
    let records: Batch =
        serde_json::from_str(&response.body).map_err(|source| ClientError::Decode {
            url: response.url.clone(),
            source,
        })?;
    Ok(Page { records, next })
}

struct PageRequest {
    url: String,
    params: QueryParams,
}

/// Follow `Link: rel="next"` headers starting at `url`.
///
/// The stream is cold: each page is requested only when the consumer polls
/// for it, and dropping the stream stops the chain. The initial `params`
/// apply to the first request only; next-page URLs already carry their query.
/// The stream ends after the first error.
pub fn paginate(sender: Arc<dyn RequestSender>, url: String, params: QueryParams) -> PageStream {
    let first = PageRequest { url, params };
    stream::try_unfold(Some(first), move |request| {
        let sender = Arc::clone(&sender);
        async move {
            let Some(request) = request else {
                return Ok(None);
            };
            let page = fetch_page(sender.as_ref(), &request).await?;
            let following = page.next.clone().map(|url| PageRequest {
                url,
                params: QueryParams::new(),
            });
            Ok::<_, ClientError>(Some((page, following)))
        }
    })
    .boxed()
}

#[instrument(skip_all, fields(url = %request.url))]
async fn fetch_page(sender: &dyn RequestSender, request: &PageRequest) -> Result<Page, ClientError> {
    let response = sender.send(&request.url, &request.params).await?;
    let page = parse_page(response)?;
    debug!(records = page.records.len(), has_next = page.next.is_some(), "fetched page");
    Ok(page)
}
