//! Download engine
//!
//! Building blocks used by [`crate::FileDownloader`]:
//! - Prerequisites resolution (remote metadata + local file)
//! - Retry with exponential backoff
//! - Full-body and chunked range performers
//! - Progress reporting with a remaining-time estimate
//! - Checksum verification

mod chunked;
mod estimator;
mod full;
mod prerequisites;
mod progress;
mod retry;
mod stream;
mod verify;

pub(crate) use chunked::download_chunked;
pub(crate) use full::download_full;
pub(crate) use prerequisites::resolve;
pub(crate) use progress::ProgressTracker;
pub(crate) use retry::is_retriable_status;
pub(crate) use verify::verify_file;

pub use estimator::SpeedEstimator;
pub use prerequisites::DownloadPrerequisites;
pub use progress::{NoProgress, ProgressSink};
pub use retry::RetryPolicy;
pub use verify::file_digest;

use crate::transport::Transport;
use reget_types::DownloadOptions;
use std::io;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How a performer's transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// All bytes are on disk
    Completed,
    /// The transfer could not finish; details were logged
    Failed,
    /// A range request was answered with the whole file
    RangeIgnored,
}

/// Everything a performer needs besides the per-call arguments
pub(crate) struct TransferContext<'a, T> {
    pub transport: &'a T,
    pub retry: &'a RetryPolicy,
    pub options: &'a DownloadOptions,
    pub cancel: &'a CancellationToken,
}

impl<'a, T: Transport> TransferContext<'a, T> {
    pub fn new(
        transport: &'a T,
        retry: &'a RetryPolicy,
        options: &'a DownloadOptions,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            transport,
            retry,
            options,
            cancel,
        }
    }
}

/// Delete `path`, ignoring a file that is already gone
pub(crate) async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete file"),
    }
}

/// Create the parent directory of `path` if it is missing
pub(crate) async fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}
