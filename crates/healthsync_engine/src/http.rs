//! HTTP remote client.
//!
//! The HTTP library is abstracted behind [`HttpClient`] so the request and
//! response handling can be exercised without a network. With the `reqwest`
//! feature (on by default) [`ReqwestClient`] provides a blocking client.

use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteSyncClient, SubmitOutcome};
use healthsync_protocol::{SyncRequest, SyncResponse};
use tracing::debug;

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// Transport faults reported by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The host could not be reached.
    Unreachable(String),
    /// The request timed out.
    Timeout,
    /// Any other failure.
    Other(String),
}

impl From<HttpError> for SyncError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Unreachable(detail) => SyncError::NetworkUnreachable(detail),
            HttpError::Timeout => SyncError::NetworkTimeout,
            HttpError::Other(detail) => SyncError::Transport(detail),
        }
    }
}

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a JSON body.
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, HttpError>;
}

/// Remote client speaking the JSON sync endpoint.
pub struct HttpRemoteClient<C: HttpClient> {
    base_url: String,
    user_id: String,
    client: C,
}

impl<C: HttpClient> HttpRemoteClient<C> {
    /// Creates a client for `base_url` (e.g. `"http://10.0.2.2:4000"`).
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            user_id: user_id.into(),
            client,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the full endpoint URL.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/api/sync/health-data/{}",
            self.base_url.trim_end_matches('/'),
            self.user_id
        )
    }
}

impl<C: HttpClient> RemoteSyncClient for HttpRemoteClient<C> {
    fn submit(&self, request: &SyncRequest) -> SyncResult<SubmitOutcome> {
        let body = request.to_json()?;
        let url = self.endpoint();
        debug!(%url, sync_type = %request.sync_type, bytes = body.len(), "posting sync batch");

        let response = self.client.post_json(&url, body)?;
        let ok_status = (200..300).contains(&response.status);

        match SyncResponse::from_json(&response.body) {
            Ok(parsed) => Ok(SubmitOutcome {
                status_code: response.status,
                success: parsed.success,
                message: parsed.message,
                accepted_count: parsed.record_count,
            }),
            Err(_) if !ok_status => Ok(SubmitOutcome {
                status_code: response.status,
                success: false,
                message: None,
                accepted_count: 0,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;

#[cfg(feature = "reqwest")]
mod reqwest_client {
    use super::{HttpClient, HttpError, HttpResponse};
    use crate::error::{SyncError, SyncResult};
    use std::time::Duration;

    /// Blocking [`HttpClient`] backed by `reqwest`.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::blocking::Client,
    }

    impl ReqwestClient {
        /// Creates a client with the same connect and request timeout.
        pub fn new(timeout: Duration) -> SyncResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .connect_timeout(timeout)
                .timeout(timeout)
                .build()
                .map_err(|e| SyncError::Transport(e.to_string()))?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, HttpError> {
            let response = self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .map_err(classify)?;

            let status = response.status().as_u16();
            let body = response.bytes().map_err(classify)?.to_vec();
            Ok(HttpResponse { status, body })
        }
    }

    fn classify(err: reqwest::Error) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout
        } else if err.is_connect() {
            HttpError::Unreachable(err.to_string())
        } else {
            HttpError::Other(err.to_string())
        }
    }
}
