//! HTTP sender implementation.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so applications
//! can plug in whichever library they already use.

use crate::error::{DrainError, DrainResult};
use crate::transport::BatchSender;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

/// Header carrying a unique id per request, used for server-side
/// deduplication of retried sends.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body.
    ///
    /// Returns the response, or a message describing a transport failure.
    fn post(&self, url: &str, headers: &[(String, String)], body: Vec<u8>)
        -> Result<HttpResponse, String>;
}

/// Response from an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Paths for single and batched delivery of one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    /// Path for one record.
    pub single: &'static str,
    /// Path for a batch of records.
    pub batch: &'static str,
}

impl Endpoints {
    /// Event tracking endpoints.
    pub const TRACK: Endpoints = Endpoints {
        single: "/v2/track",
        batch: "/v2/track/batch",
    };

    /// Identity endpoints.
    pub const IDENTIFY: Endpoints = Endpoints {
        single: "/v2/identify",
        batch: "/v2/identify/batch",
    };
}

/// Sends records as JSON over HTTP.
///
/// A single record is posted as a JSON object, a batch as a JSON array.
/// Any transport error or non-2xx status is a send failure.
pub struct HttpSender<C: HttpClient> {
    base_url: String,
    endpoints: Endpoints,
    client: C,
    headers: Vec<(String, String)>,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpSender<C> {
    /// Creates a sender posting to `endpoints` under `base_url`.
    pub fn new(base_url: impl Into<String>, endpoints: Endpoints, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            endpoints,
            client,
            headers: Vec::new(),
            last_error: RwLock::new(None),
        }
    }

    /// Creates a sender for tracked events.
    pub fn track(base_url: impl Into<String>, client: C) -> Self {
        Self::new(base_url, Endpoints::TRACK, client)
    }

    /// Creates a sender for identities.
    pub fn identify(base_url: impl Into<String>, client: C) -> Self {
        Self::new(base_url, Endpoints::IDENTIFY, client)
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the endpoints.
    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> DrainResult<()> {
        let body = serde_json::to_vec(body).map_err(DrainError::send)?;
        let url = format!("{}{}", self.base_url, path);
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut headers = self.headers.clone();
        headers.push(("Content-Type".into(), "application/json".into()));
        headers.push((REQUEST_ID_HEADER.into(), request_id.clone()));

        let response = self.client.post(&url, &headers, body).map_err(|e| {
            warn!(url = %url, error = %e, "request failed");
            *self.last_error.write() = Some(e.clone());
            DrainError::Send(e)
        })?;

        if !response.is_success() {
            warn!(url = %url, status = response.status, "request rejected");
            *self.last_error.write() = Some(format!("HTTP {}", response.status));
            return Err(DrainError::HttpStatus {
                status: response.status,
            });
        }

        debug!(url = %url, request_id = %request_id, "request accepted");
        *self.last_error.write() = None;
        Ok(())
    }
}

impl<C, T> BatchSender<T> for HttpSender<C>
where
    C: HttpClient,
    T: Serialize,
{
    fn send_one(&self, item: &T) -> DrainResult<()> {
        self.post_json(self.endpoints.single, item)
    }

    fn send_batch(&self, items: &[T]) -> DrainResult<()> {
        self.post_json(self.endpoints.batch, items)
    }
}
