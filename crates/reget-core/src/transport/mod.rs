//! Network capability consumed by the download engine
//!
//! The engine never talks HTTP directly. It issues three kinds of calls
//! through [`Transport`] and interprets the status codes itself, which keeps
//! retry classification and resume decisions independent of the client used.

mod http;

pub use http::{HttpTransport, HttpTransportConfig};

use crate::error::TransportError;
use bytes::Bytes;
use futures::Stream;
use reget_types::{ChunkRange, ExpectedChecksum};
use reqwest::StatusCode;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

/// Response body, read incrementally
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Result of a metadata probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub status: StatusCode,
    pub range_supported: bool,
    pub content_length: Option<u64>,
    pub checksum: Option<ExpectedChecksum>,
}

/// A full-content or byte-range response.
///
/// Dropping the value releases the underlying connection.
pub struct ContentResponse {
    pub status: StatusCode,
    /// Length of this body as announced by the server
    pub content_length: Option<u64>,
    /// Size of the whole remote file, from `Content-Range`
    pub content_range_total: Option<u64>,
    pub body: BodyStream,
}

impl fmt::Debug for ContentResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("content_range_total", &self.content_range_total)
            .finish_non_exhaustive()
    }
}

/// Anything the retry executor can classify by status code
pub trait StatusResponse {
    fn status(&self) -> StatusCode;
}

impl StatusResponse for RemoteMetadata {
    fn status(&self) -> StatusCode {
        self.status
    }
}

impl StatusResponse for ContentResponse {
    fn status(&self) -> StatusCode {
        self.status
    }
}

/// Asynchronous network capability.
///
/// Implementations return non-success statuses as `Ok` responses; only
/// failures to obtain a response at all are `Err`.
pub trait Transport: Send + Sync {
    /// Size, range support and checksum of the remote file
    fn fetch_metadata(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<RemoteMetadata, TransportError>> + Send;

    /// The whole remote file
    fn fetch_content(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ContentResponse, TransportError>> + Send;

    /// One inclusive byte range of the remote file
    fn fetch_range(
        &self,
        url: &str,
        range: ChunkRange,
    ) -> impl Future<Output = Result<ContentResponse, TransportError>> + Send;
}
