//! What is known before any content is transferred
//!
//! The remote metadata and the local file together decide whether a
//! download can run, whether it resumes, and whether the local file must
//! be thrown away first.

use super::retry::RetryPolicy;
use crate::error::FetchError;
use crate::transport::{RemoteMetadata, Transport};
use reget_types::ExpectedChecksum;
use std::io;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Snapshot of remote and local state taken before a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPrerequisites {
    /// False when the remote file's size could not be established
    pub can_proceed: bool,
    pub total_size: u64,
    pub expected_checksum: Option<ExpectedChecksum>,
    pub range_supported: bool,
    /// Bytes already on disk that count towards the download
    pub initial_bytes_present: u64,
    /// The local file exists but can't be resumed and must be deleted
    pub restart_required: bool,
    /// Length of the local file as found, `None` if there was none
    pub existing_length: Option<u64>,
}

impl DownloadPrerequisites {
    pub fn unavailable() -> Self {
        Self {
            can_proceed: false,
            total_size: 0,
            expected_checksum: None,
            range_supported: false,
            initial_bytes_present: 0,
            restart_required: false,
            existing_length: None,
        }
    }

    /// The local file already holds the whole remote file
    pub fn is_complete(&self) -> bool {
        self.can_proceed
            && !self.restart_required
            && self.existing_length == Some(self.total_size)
            && self.initial_bytes_present == self.total_size
    }

    /// Same remote facts, but the local file has to go
    pub fn restart(&self) -> Self {
        Self {
            initial_bytes_present: 0,
            restart_required: true,
            ..self.clone()
        }
    }

    /// State after the local file has been deleted
    pub fn cleared(&self) -> Self {
        Self {
            initial_bytes_present: 0,
            restart_required: false,
            existing_length: None,
            ..self.clone()
        }
    }

    /// State for a full-body download after the server ignored a range
    pub fn without_range_support(&self) -> Self {
        Self {
            range_supported: false,
            ..self.cleared()
        }
    }

    /// Same state, verified against `checksum` instead
    pub fn with_checksum(&self, checksum: ExpectedChecksum) -> Self {
        Self {
            expected_checksum: Some(checksum),
            ..self.clone()
        }
    }

    /// Combine remote metadata with the local file length
    pub fn reconcile(metadata: &RemoteMetadata, local: io::Result<Option<u64>>) -> Self {
        if !metadata.status.is_success() {
            return Self::unavailable();
        }
        let Some(total_size) = metadata.content_length else {
            return Self::unavailable();
        };

        let mut prerequisites = Self {
            can_proceed: true,
            total_size,
            expected_checksum: metadata.checksum.clone(),
            range_supported: metadata.range_supported,
            initial_bytes_present: 0,
            restart_required: false,
            existing_length: None,
        };

        match local {
            Ok(None) => {}
            Ok(Some(length)) => {
                prerequisites.existing_length = Some(length);
                if length == total_size {
                    prerequisites.initial_bytes_present = length;
                } else if length > total_size {
                    prerequisites.restart_required = true;
                } else if prerequisites.range_supported {
                    prerequisites.initial_bytes_present = length;
                } else {
                    prerequisites.restart_required = true;
                }
            }
            Err(_) => prerequisites.restart_required = true,
        }

        prerequisites
    }
}

/// Length of the file at `path`, `None` if it doesn't exist
async fn local_length(path: &Path) -> io::Result<Option<u64>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "destination exists and is not a regular file",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Probe the remote file and inspect the destination.
///
/// Only cancellation and timeout are errors; any other problem yields a
/// value with `can_proceed == false`.
pub(crate) async fn resolve<T: Transport>(
    transport: &T,
    retry: &RetryPolicy,
    url: &str,
    destination: &Path,
    cancel: &CancellationToken,
) -> Result<DownloadPrerequisites, FetchError> {
    let metadata = match retry
        .execute("metadata", cancel, || transport.fetch_metadata(url))
        .await
    {
        Ok(metadata) => metadata,
        Err(e) if e.interruption().is_some() => return Err(e),
        Err(e) => {
            warn!(error = %e, "Could not fetch remote metadata");
            return Ok(DownloadPrerequisites::unavailable());
        }
    };

    if !metadata.status.is_success() {
        warn!(status = %metadata.status, "Metadata request was not successful");
        return Ok(DownloadPrerequisites::unavailable());
    }
    if metadata.content_length.is_none() {
        warn!("Server did not report the file size");
        return Ok(DownloadPrerequisites::unavailable());
    }

    let local = local_length(destination).await;
    if let Err(e) = &local {
        warn!(path = %destination.display(), error = %e, "Could not inspect existing file");
    }

    let prerequisites = DownloadPrerequisites::reconcile(&metadata, local);
    debug!(?prerequisites, "Resolved download prerequisites");
    if prerequisites.restart_required {
        info!(
            existing = ?prerequisites.existing_length,
            total = prerequisites.total_size,
            "Existing file cannot be resumed, restarting"
        );
    } else if prerequisites.initial_bytes_present > 0 && !prerequisites.is_complete() {
        info!(
            offset = prerequisites.initial_bytes_present,
            total = prerequisites.total_size,
            "Resuming partial download"
        );
    }

    Ok(prerequisites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn meta(range_supported: bool, content_length: Option<u64>) -> RemoteMetadata {
        RemoteMetadata {
            status: StatusCode::OK,
            range_supported,
            content_length,
            checksum: None,
        }
    }

    #[test]
    fn test_unknown_size_cannot_proceed() {
        let p = DownloadPrerequisites::reconcile(&meta(true, None), Ok(None));
        assert!(!p.can_proceed);
    }

    #[test]
    fn test_failed_status_cannot_proceed() {
        let mut m = meta(true, Some(10));
        m.status = StatusCode::NOT_FOUND;
        assert!(!DownloadPrerequisites::reconcile(&m, Ok(None)).can_proceed);
    }

    #[test]
    fn test_fresh_download() {
        let p = DownloadPrerequisites::reconcile(&meta(true, Some(100)), Ok(None));
        assert!(p.can_proceed);
        assert_eq!(p.initial_bytes_present, 0);
        assert!(!p.restart_required);
        assert!(!p.is_complete());
    }

    #[test]
    fn test_partial_with_ranges_resumes() {
        let p = DownloadPrerequisites::reconcile(&meta(true, Some(100)), Ok(Some(40)));
        assert_eq!(p.initial_bytes_present, 40);
        assert!(!p.restart_required);
    }

    #[test]
    fn test_partial_without_ranges_restarts() {
        let p = DownloadPrerequisites::reconcile(&meta(false, Some(100)), Ok(Some(40)));
        assert_eq!(p.initial_bytes_present, 0);
        assert!(p.restart_required);
    }

    #[test]
    fn test_oversized_local_restarts() {
        let p = DownloadPrerequisites::reconcile(&meta(true, Some(100)), Ok(Some(101)));
        assert!(p.restart_required);
        assert_eq!(p.initial_bytes_present, 0);
    }

    #[test]
    fn test_complete_local_file() {
        for ranges in [true, false] {
            let p = DownloadPrerequisites::reconcile(&meta(ranges, Some(100)), Ok(Some(100)));
            assert!(p.is_complete());
            assert_eq!(p.initial_bytes_present, 100);
        }
    }

    #[test]
    fn test_empty_remote_without_local_is_not_complete() {
        let p = DownloadPrerequisites::reconcile(&meta(true, Some(0)), Ok(None));
        assert!(p.can_proceed);
        assert!(!p.is_complete());
    }

    #[test]
    fn test_unreadable_local_restarts() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let p = DownloadPrerequisites::reconcile(&meta(true, Some(100)), Err(err));
        assert!(p.restart_required);
    }

    #[test]
    fn test_transitions() {
        let p = DownloadPrerequisites::reconcile(&meta(true, Some(100)), Ok(Some(100)));

        let restart = p.restart();
        assert!(restart.restart_required);
        assert_eq!(restart.initial_bytes_present, 0);
        assert!(!restart.is_complete());

        let cleared = restart.cleared();
        assert!(!cleared.restart_required);
        assert_eq!(cleared.existing_length, None);
        assert!(cleared.range_supported);

        let full = p.without_range_support();
        assert!(!full.range_supported);
        assert_eq!(full.initial_bytes_present, 0);
        assert_eq!(full.total_size, 100);
    }

    #[tokio::test]
    async fn test_local_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        assert_eq!(local_length(&path).await.unwrap(), None);

        tokio::fs::write(&path, b"12345").await.unwrap();
        assert_eq!(local_length(&path).await.unwrap(), Some(5));

        assert!(local_length(dir.path()).await.is_err());
    }
}
