//! Chunked range download with resume
//!
//! Fetches fixed-size byte windows one after another, starting at the
//! resume offset. Each window is flushed to disk before the next request
//! goes out, so an interrupted download always leaves a valid prefix that
//! a later attempt can continue from.
//!
//! A range response whose `Content-Range` total disagrees with the known
//! size means the remote file changed under us. The prefix on disk then
//! belongs to another file, so it is deleted and the transfer fails.

use super::progress::ProgressTracker;
use super::stream::copy_body;
use super::{ensure_parent_dir, remove_file_quietly, TransferContext, TransferOutcome};
use crate::error::FetchError;
use crate::transport::Transport;
use reget_types::ChunkRange;
use reqwest::StatusCode;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

pub(crate) async fn download_chunked<T: Transport>(
    ctx: &TransferContext<'_, T>,
    url: &str,
    destination: &Path,
    resume_offset: u64,
    tracker: &mut ProgressTracker<'_>,
) -> Result<TransferOutcome, FetchError> {
    let total_size = tracker.total_size();
    let mut file = open_destination(destination, resume_offset).await?;

    let mut downloaded = resume_offset;
    let mut position = resume_offset;
    info!(
        "Starting chunked download at offset {} of {} bytes",
        resume_offset, total_size
    );

    let chunk_size = ctx.options.chunk_size;
    while let Some(range) = ChunkRange::next_window(downloaded, chunk_size, total_size) {
        if ctx.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let response = ctx
            .retry
            .execute("range", ctx.cancel, || ctx.transport.fetch_range(url, range))
            .await?;

        match response.status {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::RANGE_NOT_SATISFIABLE => {
                info!(%range, "Server reports range not satisfiable, nothing left to fetch");
                break;
            }
            StatusCode::OK => {
                warn!(%range, "Server ignored the range request and sent the whole file");
                return Ok(TransferOutcome::RangeIgnored);
            }
            status => {
                warn!(%range, %status, "Range request failed");
                return Ok(TransferOutcome::Failed);
            }
        }

        if let Some(remote_total) = response.content_range_total {
            if remote_total != total_size {
                warn!(
                    %range,
                    expected = total_size,
                    remote_total,
                    "Remote file size changed during download, discarding partial file"
                );
                drop(file);
                remove_file_quietly(destination).await;
                return Ok(TransferOutcome::Failed);
            }
        }

        if position != range.from {
            file.seek(SeekFrom::Start(range.from)).await?;
        }

        let base = range.from;
        let written = copy_body(
            response.body,
            &mut file,
            ctx.options.buffer_size,
            Some(range.byte_count()),
            ctx.cancel,
            |written| tracker.report(base + written),
        )
        .await?;

        if written == 0 {
            warn!(%range, "Range response carried no data");
            file.flush().await?;
            return Ok(TransferOutcome::Failed);
        }

        file.flush().await?;
        downloaded = range.from + written;
        position = downloaded;
        debug!(%range, written, downloaded, "Chunk written");
    }

    file.flush().await?;
    file.sync_all().await?;
    let on_disk = file.metadata().await?.len();
    if on_disk < total_size {
        warn!(
            on_disk,
            expected = total_size,
            "File is shorter than the remote file after chunked download"
        );
        return Ok(TransferOutcome::Failed);
    }

    info!("Chunked download finished ({} bytes)", on_disk);
    Ok(TransferOutcome::Completed)
}

/// Truncate for a fresh start, otherwise open for writing at the offset
async fn open_destination(destination: &Path, resume_offset: u64) -> Result<File, FetchError> {
    if resume_offset == 0 {
        ensure_parent_dir(destination).await?;
        return Ok(File::create(destination).await?);
    }

    let mut file = OpenOptions::new().write(true).open(destination).await?;
    file.seek(SeekFrom::Start(resume_offset)).await?;
    Ok(file)
}
