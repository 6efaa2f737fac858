//! Single-file download orchestration
//!
//! [`FileDownloader::try_download_file`] ties the engine together:
//! resolve prerequisites, skip or restart based on the local file, pick a
//! performer, then verify. Every call runs in its own `download` span with
//! a fresh id so interleaved logs of concurrent downloads stay apart.

use crate::engine::{
    download_chunked, download_full, remove_file_quietly, resolve, verify_file,
    DownloadPrerequisites, ProgressSink, ProgressTracker, RetryPolicy, TransferContext,
    TransferOutcome,
};
use crate::error::{FetchError, Interrupted};
use crate::transport::{RemoteMetadata, Transport};
use reget_types::{DownloadOptions, ExpectedChecksum};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Downloads single files over a [`Transport`].
///
/// Holds no per-download state; one instance can serve any number of
/// concurrent downloads to distinct destinations.
#[derive(Debug)]
pub struct FileDownloader<T> {
    transport: T,
    options: DownloadOptions,
    retry: RetryPolicy,
}

impl<T: Transport> FileDownloader<T> {
    pub fn new(transport: T, options: DownloadOptions) -> Self {
        let options = options.validate();
        let retry = RetryPolicy::from(&options);
        Self {
            transport,
            options,
            retry,
        }
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch remote metadata through the retry executor
    pub async fn probe(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteMetadata, FetchError> {
        self.retry
            .execute("metadata", cancel, || self.transport.fetch_metadata(url))
            .await
    }

    /// What a download of `url` to `destination` would start from
    pub async fn prerequisites(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<DownloadPrerequisites, FetchError> {
        resolve(&self.transport, &self.retry, url, destination, cancel).await
    }

    /// Download `url` to `destination`, resuming a partial file when the
    /// server allows it.
    ///
    /// Returns `Ok(true)` when the file is complete and verified and
    /// `Ok(false)` on any failure (already logged). Cancellation and
    /// timeouts are returned as `Err`.
    pub async fn try_download_file(
        &self,
        url: &str,
        destination: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<bool, Interrupted> {
        self.try_download_file_with_checksum(url, destination, None, progress, cancel)
            .await
    }

    /// Like [`try_download_file`](Self::try_download_file), but verified
    /// against `checksum` instead of whatever the server announces
    pub async fn try_download_file_with_checksum(
        &self,
        url: &str,
        destination: &Path,
        checksum: Option<ExpectedChecksum>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<bool, Interrupted> {
        let id = Uuid::new_v4();
        let span = info_span!("download", %id, url);

        async move {
            info!(destination = %destination.display(), "Download started");
            match self.run(url, destination, checksum, progress, cancel).await {
                Ok(true) => {
                    info!("Download completed");
                    Ok(true)
                }
                Ok(false) => {
                    warn!("Download failed");
                    Ok(false)
                }
                Err(e) => match e.interruption() {
                    Some(interrupted) => {
                        info!(reason = %interrupted, "Download interrupted");
                        Err(interrupted)
                    }
                    None => {
                        error!(error = %e, "Download failed");
                        Ok(false)
                    }
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        url: &str,
        destination: &Path,
        checksum: Option<ExpectedChecksum>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<bool, FetchError> {
        let ctx = TransferContext::new(&self.transport, &self.retry, &self.options, cancel);
        let buffer_size = self.options.buffer_size;

        let mut prerequisites =
            resolve(&self.transport, &self.retry, url, destination, cancel).await?;
        if !prerequisites.can_proceed {
            warn!("Cannot proceed without a known remote file size");
            return Ok(false);
        }
        if let Some(checksum) = checksum {
            prerequisites = prerequisites.with_checksum(checksum);
        }

        let mut tracker = ProgressTracker::new(progress);

        if prerequisites.is_complete() {
            info!(size = prerequisites.total_size, "File already present, verifying");
            let checksum = prerequisites.expected_checksum.as_ref();
            if verify_file(destination, checksum, buffer_size, cancel).await? {
                tracker.start(prerequisites.total_size, prerequisites.total_size);
                tracker.finish();
                return Ok(true);
            }
            prerequisites = prerequisites.restart();
        }

        if prerequisites.restart_required {
            remove_file_quietly(destination).await;
            prerequisites = prerequisites.cleared();
        }

        tracker.start(prerequisites.total_size, prerequisites.initial_bytes_present);
        tracker.report(prerequisites.initial_bytes_present);

        let mut outcome = if prerequisites.range_supported {
            download_chunked(
                &ctx,
                url,
                destination,
                prerequisites.initial_bytes_present,
                &mut tracker,
            )
            .await?
        } else {
            download_full(&ctx, url, destination, &mut tracker).await?
        };

        if outcome == TransferOutcome::RangeIgnored {
            info!("Falling back to a full download");
            prerequisites = prerequisites.without_range_support();
            remove_file_quietly(destination).await;
            tracker.start(prerequisites.total_size, 0);
            outcome = download_full(&ctx, url, destination, &mut tracker).await?;
        }

        match outcome {
            TransferOutcome::Completed => {
                let checksum = prerequisites.expected_checksum.as_ref();
                let verified = verify_file(destination, checksum, buffer_size, cancel).await?;
                if verified {
                    tracker.finish();
                }
                Ok(verified)
            }
            TransferOutcome::Failed | TransferOutcome::RangeIgnored => Ok(false),
        }
    }
}
