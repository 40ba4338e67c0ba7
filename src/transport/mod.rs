//! HTTP transport used to talk to binary cache mirrors
//!
//! The filesystem only ever issues `GET` requests, so the transport seam is a
//! single method. `UreqTransport` is the real client; `CachingTransport`
//! decorates any transport with a persistent on-disk copy of response bodies.

mod persistent;

pub use persistent::CachingTransport;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use std::fmt;
use std::io::{self, Read};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Default global request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors produced by a transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Local storage error: {context}")]
    LocalStorage {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Status and network failures are worth trying on another mirror
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::LocalStorage { .. })
    }
}

/// An outgoing GET request
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
        }
    }

    /// Attach an HTTP Basic `Authorization` header
    pub fn with_basic_auth(mut self, login: &str, password: &str) -> Self {
        let token = BASE64_STANDARD.encode(format!("{}:{}", login, password));
        self.headers
            .push(("authorization".to_string(), format!("Basic {}", token)));
        self
    }

    /// Look up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name)
    }
}

/// A response with a streaming body
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers, lower-cased names
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Box<dyn Read + Send>,
    /// Whether the body was served from the persistent cache
    pub from_cache: bool,
}

impl Response {
    /// Build a 200 response around a body with no headers
    pub fn ok(body: Box<dyn Read + Send>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
            from_cache: false,
        }
    }

    /// Look up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name)
    }

    /// Read the whole body into memory
    pub fn read_to_vec(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("from_cache", &self.from_cache)
            .finish_non_exhaustive()
    }
}

fn lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Issues GET requests on behalf of the filesystem
///
/// Implementations must turn non-2xx statuses into `TransportError::Status`.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }
}

/// Blocking transport backed by a `ureq` agent
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport with the given global timeout
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let url = &request.url;
        debug!("HTTP GET {}", url);

        let mut builder = self.agent.get(url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.call().map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(TransportError::Status {
                url: url.to_string(),
                status,
            });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        Ok(Response {
            status,
            headers,
            body: Box::new(response.into_body().into_reader()),
            from_cache: false,
        })
    }
}
