//! Full-body download for servers without byte-range support
//!
//! One GET, streamed straight into a freshly truncated file. Any failure
//! after the file was created deletes it, since a partial body can't be
//! resumed without range support.

use super::progress::ProgressTracker;
use super::stream::copy_body;
use super::{ensure_parent_dir, remove_file_quietly, TransferContext, TransferOutcome};
use crate::error::FetchError;
use crate::transport::Transport;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

pub(crate) async fn download_full<T: Transport>(
    ctx: &TransferContext<'_, T>,
    url: &str,
    destination: &Path,
    tracker: &mut ProgressTracker<'_>,
) -> Result<TransferOutcome, FetchError> {
    let response = ctx
        .retry
        .execute("content", ctx.cancel, || ctx.transport.fetch_content(url))
        .await?;

    if !response.status.is_success() {
        warn!(status = %response.status, "Content request failed");
        return Ok(TransferOutcome::Failed);
    }

    let mut total_size = tracker.total_size();
    if let Some(length) = response.content_length {
        if length != total_size {
            info!(
                announced = total_size,
                actual = length,
                "Response length differs from metadata, using response length"
            );
            total_size = length;
            tracker.start(total_size, 0);
        }
    }

    info!("Starting full download of {} bytes", total_size);

    let written = match write_body(ctx, response.body, destination, tracker).await {
        Ok(written) => written,
        Err(e) => {
            remove_file_quietly(destination).await;
            return Err(e);
        }
    };

    if written != total_size {
        warn!(
            expected = total_size,
            written, "Body length does not match the expected size, discarding file"
        );
        remove_file_quietly(destination).await;
        return Ok(TransferOutcome::Failed);
    }

    info!("Full download finished ({} bytes)", written);
    Ok(TransferOutcome::Completed)
}

async fn write_body<T: Transport>(
    ctx: &TransferContext<'_, T>,
    body: crate::transport::BodyStream,
    destination: &Path,
    tracker: &mut ProgressTracker<'_>,
) -> Result<u64, FetchError> {
    ensure_parent_dir(destination).await?;
    let mut file = tokio::fs::File::create(destination).await?;

    let written = copy_body(
        body,
        &mut file,
        ctx.options.buffer_size,
        None,
        ctx.cancel,
        |written| tracker.report(written),
    )
    .await?;

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
