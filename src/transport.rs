//! Live HTTP transport. The resource client only sees the [`Transport`]
//! trait: "send a request, get a JSON payload or an error".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::error::TransportError;
use crate::session::Session;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Adds `key=value` only when a value is given.
    pub fn query_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Success yields the decoded JSON body (`Null` when empty).
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError>;
}

/// reqwest-backed transport with bearer auth and 401 session invalidation.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    session: Option<Session>,
}

impl HttpTransport {
    pub fn new(settings: &Settings, session: Option<Session>) -> Result<Self, TransportError> {
        Self::with_base_url(&settings.api_base_url, settings.api_timeout(), session)
    }

    pub fn with_base_url(
        base_url: &str,
        timeout: Duration,
        session: Option<Session>,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = self.session.as_ref().and_then(Session::token) {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        log::debug!("{:?} {}", request.method, url);
        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // The one signal that invalidates the stored session.
            if let Some(session) = &self.session {
                if let Err(e) = session.clear() {
                    log::warn!("failed to clear session after 401: {}", e);
                }
            }
            return Err(TransportError::Unauthorized);
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status { status: status.as_u16(), body: text });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// In-process transport for tests: replies from a script and records
/// every request it is handed.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Value, TransportError>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn replying(replies: Vec<Result<Value, TransportError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), requests: Mutex::default() })
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Once the script runs out every request fails as if nothing listened.
    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("connection refused".into())))
        }
    }
}
