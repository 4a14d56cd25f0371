use crate::error::{Result, SpriteError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

const ERROR_BODY_LIMIT: usize = 500;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body, turning any non-success status into `Http`.
    pub fn into_json(self) -> Result<Value> {
        if !self.is_success() {
            let body: String = self.body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(SpriteError::Http {
                status: self.status,
                body,
            });
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply>;
    async fn get(&self, url: &str) -> Result<HttpReply>;
}

/// `reqwest`-backed transport carrying a fixed set of auth headers.
pub struct HttpTransport {
    client: Client,
    headers: HeaderMap,
    post_timeout: Duration,
    get_timeout: Duration,
}

impl HttpTransport {
    pub fn new(auth_header: &str, auth_value: &str, post_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let name = HeaderName::from_bytes(auth_header.as_bytes())
            .map_err(|e| SpriteError::Config(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(auth_value)
            .map_err(|e| SpriteError::Config(format!("Invalid API key: {}", e)))?;
        headers.insert(name, value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: Client::new(),
            headers,
            post_timeout,
            get_timeout: Duration::from_secs(60),
        })
    }

    pub fn bearer(api_key: &str, post_timeout: Duration) -> Result<Self> {
        Self::new("authorization", &format!("Bearer {}", api_key), post_timeout)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply> {
        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .timeout(self.post_timeout)
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }

    async fn get(&self, url: &str) -> Result<HttpReply> {
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .timeout(self.get_timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}

/// A request as seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

/// Replays queued replies in order and records every request. Used to drive
/// the clients without a network.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<HttpReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = HttpReply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next(&self, method: &'static str, url: &str, body: Option<&Value>) -> Result<HttpReply> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                method,
                url: url.to_string(),
                body: body.cloned(),
            });
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .ok_or_else(|| SpriteError::Network(format!("No scripted reply for {} {}", method, url)))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply> {
        self.next("POST", url, Some(body))
    }

    async fn get(&self, url: &str) -> Result<HttpReply> {
        self.next("GET", url, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_are_truncated() {
        let reply = HttpReply::new(500, "x".repeat(2000));
        match reply.into_json() {
            Err(SpriteError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), ERROR_BODY_LIMIT);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new(vec![HttpReply::new(429, ""), HttpReply::new(200, "{}")]);
        let body = serde_json::json!({"a": 1});

        assert_eq!(transport.post_json("u1", &body).await.unwrap().status, 429);
        assert_eq!(transport.get("u2").await.unwrap().status, 200);
        assert!(transport.get("u3").await.is_err());

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].body, Some(body));
        assert_eq!(requests[1].method, "GET");
    }

    #[test]
    fn rejects_keys_that_cannot_be_headers() {
        assert!(HttpTransport::bearer("bad\nkey", Duration::from_secs(1)).is_err());
    }
}
