//! HTTP request/response value types and the single-shot client.
//!
//! [`HttpClient`] is a thin wrapper over [`reqwest::Client`]: it injects a
//! `User-Agent` when the request carries none, applies an optional bearer
//! token, serializes JSON bodies with the matching `Content-Type`, and
//! reads response bodies chunkwise bounded at [`MAX_RESPONSE_BYTES`].
//!
//! Header maps preserve the case and order headers were written in while
//! looking them up case-insensitively, so a server's `retry-after` and
//! `Retry-After` read the same.
//!
//! # Example
//!
//! ```no_run
//! use agent_substrate::{HttpClient, HttpMethod, HttpRequest};
//!
//! # async fn example() -> agent_substrate::Result<()> {
//! let client = HttpClient::new()?;
//! let response = client
//!     .execute(
//!         &HttpRequest::new(HttpMethod::Get, "https://api.example.com/models")
//!             .with_header("Accept", "application/json"),
//!     )
//!     .await?;
//! if response.is_success() {
//!     let models: serde_json::Value = response.parse_json()?;
//!     println!("{models}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Upper bound on a response body read.
pub const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_USER_AGENT: &str = concat!("agent-substrate/", env!("CARGO_PKG_VERSION"));

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Case-preserving, insertion-ordered header list with case-insensitive
/// lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the first header with this name (case-insensitively), or
    /// append it.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Append without replacing.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for a name, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An HTTP request value: method, URL, headers, optional body bytes.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize a JSON body and set `Content-Type: application/json`.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers.insert("Content-Type", "application/json");
        Ok(self)
    }

    /// Set an `Authorization: Bearer <token>` header.
    pub fn with_bearer_token(mut self, token: &str) -> Self {
        self.headers.insert("Authorization", format!("Bearer {token}"));
        self
    }
}

/// An HTTP response value: status, headers, body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// True iff 200 <= status < 300.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Configuration for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Single-shot HTTP client over one [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: HttpClientConfig,
    bearer_token: Option<String>,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            inner,
            config,
            bearer_token: None,
        })
    }

    /// Attach a bearer token applied to every request that lacks an
    /// `Authorization` header.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.execute(&HttpRequest::new(HttpMethod::Get, url)).await
    }

    pub async fn post_json<T: Serialize>(&self, url: &str, body: &T) -> Result<HttpResponse> {
        self.execute(&HttpRequest::new(HttpMethod::Post, url).with_json(body)?)
            .await
    }

    pub async fn put_json<T: Serialize>(&self, url: &str, body: &T) -> Result<HttpResponse> {
        self.execute(&HttpRequest::new(HttpMethod::Put, url).with_json(body)?)
            .await
    }

    pub async fn delete(&self, url: &str) -> Result<HttpResponse> {
        self.execute(&HttpRequest::new(HttpMethod::Delete, url))
            .await
    }

    /// Execute an arbitrary request value.
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        dispatch(
            &self.inner,
            request,
            &self.config.user_agent,
            self.bearer_token.as_deref(),
        )
        .await
    }
}

/// Send a request value through a reqwest client and materialize the
/// response. Shared by [`HttpClient`] and the pooled client.
pub(crate) async fn dispatch(
    client: &reqwest::Client,
    request: &HttpRequest,
    user_agent: &str,
    bearer_token: Option<&str>,
) -> Result<HttpResponse> {
    let mut builder = client.request(request.method.to_reqwest(), &request.url);
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }
    if !request.headers.contains("User-Agent") {
        builder = builder.header("User-Agent", user_agent);
    }
    if let Some(token) = bearer_token {
        if !request.headers.contains("Authorization") {
            builder = builder.bearer_auth(token);
        }
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let mut response = builder.send().await?;
    let status = response.status().as_u16();
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        headers.append(name.as_str(), value.to_str().unwrap_or_default());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(Error::BodyTooLarge(MAX_RESPONSE_BYTES));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
