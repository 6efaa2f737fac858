//! reqwest-backed transport

use super::{BodyStream, ContentResponse, RemoteMetadata, Transport};
use crate::engine::is_retriable_status;
use crate::error::TransportError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::TryStreamExt;
use reget_types::{ChecksumAlgorithm, ChunkRange, ExpectedChecksum};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Response, StatusCode};
use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client settings for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Applies to metadata calls as a whole and to every body read
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("reget/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Production transport using `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
        })
    }

    /// Wrap an existing client (shared connection pool, custom TLS, ...)
    pub fn with_client(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// GET `bytes=0-0` for servers whose HEAD response carries no length
    async fn probe_with_range(&self, url: &str) -> Result<Option<RemoteMetadata>, TransportError> {
        info!(url, "HEAD didn't return Content-Length, trying partial GET");

        let response = self
            .client
            .get(url)
            .header(header::RANGE, "bytes=0-0")
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = response.status();
        debug!(url, %status, "Partial GET status");

        let metadata = match status {
            StatusCode::PARTIAL_CONTENT => Some(RemoteMetadata {
                status,
                range_supported: true,
                content_length: content_range_total(response.headers()),
                checksum: checksum_from_headers(response.headers()),
            }),
            StatusCode::OK => Some(RemoteMetadata {
                status,
                range_supported: false,
                content_length: content_length(response.headers()),
                checksum: checksum_from_headers(response.headers()),
            }),
            _ => None,
        };

        Ok(metadata)
    }
}

impl Transport for HttpTransport {
    async fn fetch_metadata(&self, url: &str) -> Result<RemoteMetadata, TransportError> {
        let response = self
            .client
            .head(url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let headers = response.headers();
        let metadata = RemoteMetadata {
            status: response.status(),
            range_supported: headers
                .get(header::ACCEPT_RANGES)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().eq_ignore_ascii_case("bytes"))
                .unwrap_or(false),
            content_length: content_length(headers),
            checksum: checksum_from_headers(headers),
        };

        // Retriable statuses go back to the retry executor untouched
        let retriable = is_retriable_status(metadata.status);
        if retriable || (metadata.status.is_success() && metadata.content_length.is_some()) {
            return Ok(metadata);
        }

        match self.probe_with_range(url).await {
            Ok(Some(probed)) => Ok(RemoteMetadata {
                checksum: metadata.checksum.or(probed.checksum),
                ..probed
            }),
            Ok(None) => Ok(metadata),
            Err(e) => {
                warn!(url, error = %e, "Partial GET probe failed - continuing without size info");
                Ok(metadata)
            }
        }
    }

    async fn fetch_content(&self, url: &str) -> Result<ContentResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        Ok(into_content_response(response))
    }

    async fn fetch_range(
        &self,
        url: &str,
        range: ChunkRange,
    ) -> Result<ContentResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header(header::RANGE, range.header_value())
            .send()
            .await?;
        Ok(into_content_response(response))
    }
}

fn into_content_response(response: Response) -> ContentResponse {
    let status = response.status();
    let content_length = content_length(response.headers());
    let content_range_total = content_range_total(response.headers());
    let body: BodyStream = Box::pin(response.bytes_stream().map_err(body_error));

    ContentResponse {
        status,
        content_length,
        content_range_total,
        body,
    }
}

fn body_error(error: reqwest::Error) -> io::Error {
    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::ConnectionAborted
    };
    io::Error::new(kind, error)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Total from `Content-Range: bytes 0-99/1000` (also `bytes */1000` on 416)
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(header::CONTENT_RANGE)?.to_str().ok()?;
    parse_content_range_total(value)
}

pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    let total = total.trim();
    if total == "*" {
        return None;
    }
    total.parse().ok()
}

fn checksum_from_headers(headers: &HeaderMap) -> Option<ExpectedChecksum> {
    if let Some(digest) = headers
        .get(header::HeaderName::from_static("digest"))
        .and_then(|v| v.to_str().ok())
        .and_then(parse_digest_header)
    {
        return Some(digest);
    }

    headers
        .get(header::HeaderName::from_static("content-md5"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| decode_digest(ChecksumAlgorithm::Md5, v))
}

/// `Digest: sha-256=<base64>, md5=<base64>`; SHA-256 wins when both are present
pub(crate) fn parse_digest_header(value: &str) -> Option<ExpectedChecksum> {
    let mut md5 = None;

    for entry in value.split(',') {
        let Some((name, encoded)) = entry.trim().split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "sha-256" => {
                if let Some(checksum) = decode_digest(ChecksumAlgorithm::Sha256, encoded) {
                    return Some(checksum);
                }
            }
            "md5" => md5 = decode_digest(ChecksumAlgorithm::Md5, encoded),
            _ => {}
        }
    }

    md5
}

fn decode_digest(algorithm: ChecksumAlgorithm, encoded: &str) -> Option<ExpectedChecksum> {
    let digest = BASE64.decode(encoded.trim()).ok()?;
    if digest.len() != algorithm.digest_len() {
        warn!(%algorithm, len = digest.len(), "Ignoring checksum header with unexpected length");
        return None;
    }
    Some(ExpectedChecksum { algorithm, digest })
}
