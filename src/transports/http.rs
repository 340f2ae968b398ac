//! Live HTTP transport backed by reqwest.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tracing::{debug, info, trace};

use crate::transport::{Handshake, Transport};
use crate::{MjpegError, Result};

/// Transport reading a `multipart/x-mixed-replace` body over HTTP(S).
///
/// The request is issued on [`open`](Transport::open); chunks are then
/// pulled from the streaming response body. Dropping the transport aborts
/// the request.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    response: Option<reqwest::Response>,
}

impl HttpTransport {
    /// Create a transport for the given stream URL.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| MjpegError::connection_failed_with_source("building HTTP client", Box::new(e)))?;

        Ok(Self { client, url: url.into(), headers: HeaderMap::new(), response: None })
    }

    /// Use a preconfigured client (shared pools, proxies, custom TLS).
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self { client, url: url.into(), headers: HeaderMap::new(), response: None }
    }

    /// Add a request header, e.g. `Authorization` for camera auth.
    ///
    /// Invalid names or values are rejected as a `Protocol` error.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::try_from(name)
            .map_err(|_| MjpegError::protocol(format!("invalid header name {name:?}")))?;
        let value = HeaderValue::try_from(value)
            .map_err(|_| MjpegError::protocol("invalid header value"))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(&mut self) -> Result<Handshake> {
        info!(url = %self.url, "Opening MJPEG stream");

        let response = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| MjpegError::connection_failed_with_source(
                format!("requesting {}", self.url),
                Box::new(e),
            ))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MjpegError::protocol(format!("server answered with status {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        debug!(%status, %content_type, "Stream response accepted");
        self.response = Some(response);

        Ok(Handshake { content_type })
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let response = self
            .response
            .as_mut()
            .ok_or_else(|| MjpegError::connection_failed("transport is not open"))?;

        let chunk = response
            .chunk()
            .await
            .map_err(|e| MjpegError::connection_failed_with_source("reading body chunk", Box::new(e)))?;

        if let Some(chunk) = &chunk {
            trace!(len = chunk.len(), "Received chunk");
        } else {
            debug!("Server closed the stream");
        }

        Ok(chunk)
    }
}
