//! reget core - resumable, verified single-file downloads
//!
//! [`FileDownloader`] fetches one remote file to a local path over a
//! pluggable [`Transport`], resuming partial files with byte-range
//! requests, retrying transient failures with exponential backoff and
//! checking the result against a server-supplied checksum.

mod downloader;
mod engine;
mod error;
pub mod transport;

pub use downloader::FileDownloader;
pub use engine::{
    file_digest, DownloadPrerequisites, NoProgress, ProgressSink, RetryPolicy, SpeedEstimator,
    TransferOutcome,
};
pub use error::*;
pub use transport::{
    ContentResponse, HttpTransport, HttpTransportConfig, RemoteMetadata, Transport,
};

pub use reget_types::{
    ChecksumAlgorithm, ChunkRange, DownloadOptions, ExpectedChecksum, FileProgress,
};
pub use tokio_util::sync::CancellationToken;
