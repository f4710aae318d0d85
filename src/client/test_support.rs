use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, LINK};
use reqwest::StatusCode;

use super::{ClientError, RawResponse, RequestSender};

/// Canned reply for one URL.
#[derive(Clone)]
pub struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
    delay: Duration,
}

impl Reply {
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A 200 reply carrying `body` and, if given, a `Link: rel="next"` header.
pub fn json_page(body: serde_json::Value, next: Option<&str>) -> Reply {
    let mut headers = HeaderMap::new();
    if let Some(next) = next {
        let link = format!("<{next}>; rel=\"next\", <{next}&last=1>; rel=\"last\"");
        headers.insert(LINK, HeaderValue::from_str(&link).unwrap());
    }
    Reply {
        status: StatusCode::OK,
        headers,
        body: body.to_string(),
        delay: Duration::ZERO,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub url: String,
    pub params: Vec<(String, String)>,
}

/// In-memory [`RequestSender`] keyed by exact URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeSender {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_string(), reply);
        self
    }

    pub fn respond_status(self, url: &str, status: StatusCode, body: &str) -> Self {
        let reply = Reply {
            status,
            headers: HeaderMap::new(),
            body: body.to_string(),
            delay: Duration::ZERO,
        };
        self.respond(url, reply)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }
}

#[async_trait]
impl RequestSender for FakeSender {
    async fn send(&self, url: &str, params: &[(&'static str, String)]) -> Result<RawResponse, ClientError> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            params: params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        });

        let reply = self.replies.get(url).cloned();
        let Some(reply) = reply else {
            return Ok(RawResponse {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND,
                headers: HeaderMap::new(),
                body: "Not Found".to_string(),
            });
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        Ok(RawResponse {
            url: url.to_string(),
            status: reply.status,
            headers: reply.headers,
            body: reply.body,
        })
    }
}
