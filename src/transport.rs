//! HTTP exchange behind [`ApiClient`](crate::ApiClient).
//!
//! The client only needs "send this request, give me the JSON body or a
//! status error", so that is the whole [`Transport`] contract.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved request, ready for the wire.
#[derive(Clone)]
pub struct HttpRequest {
    /// `feature.action` label used in errors and logs.
    pub operation: String,
    pub method: Method,
    pub url: Url,
    pub bearer: Option<String>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("operation", &self.operation)
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("bearer", &self.bearer.as_ref().map(|_| "[REDACTED]"))
            .field("query", &self.query)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Performs one HTTP exchange.
///
/// Implementations return the decoded body on 2xx (`Value::Null` for an
/// empty body, `Value::String` for a non-JSON body), [`Error::Status`] for
/// any other status, and [`Error::Timeout`] when the request's timeout
/// elapses.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<Value, Error>> + Send;
}

/// Decode a response body the way every transport should.
#[must_use]
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// [`Transport`] over a shared `reqwest::Client`.
#[cfg(feature = "reqwest-transport")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

#[cfg(feature = "reqwest-transport")]
impl ReqwestTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    fn map_send_error(error: reqwest::Error, operation: &str) -> Error {
        if error.is_timeout() {
            Error::Timeout {
                operation: operation.to_owned(),
            }
        } else {
            Error::Http(error)
        }
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            operation: operation.to_owned(),
            status,
            detail: body,
        })
    }
}

#[cfg(feature = "reqwest-transport")]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<Value, Error> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.http.request(method, request.url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!(operation = %request.operation, method = %request.method, url = %request.url, "Sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, &request.operation))?;
        let response = Self::ensure_success(response, &request.operation).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::map_send_error(e, &request.operation))?;
        Ok(decode_body(&bytes))
    }
}
