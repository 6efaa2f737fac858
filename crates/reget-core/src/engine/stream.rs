//! Copies a response body into a file through a fixed-size buffer

use crate::error::FetchError;
use crate::transport::BodyStream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

/// Stream `body` into `writer`, at most `limit` bytes when given.
///
/// `on_written` gets the running byte count after every write. Returns the
/// number of bytes written.
pub(crate) async fn copy_body<W>(
    body: BodyStream,
    writer: &mut W,
    buffer_size: usize,
    limit: Option<u64>,
    cancel: &CancellationToken,
    on_written: impl FnMut(u64),
) -> Result<u64, FetchError>
where
    W: AsyncWrite + Unpin,
{
    let reader = StreamReader::new(body);
    copy_reader(reader, writer, buffer_size, limit, cancel, on_written).await
}

async fn copy_reader<R, W>(
    mut reader: R,
    writer: &mut W,
    buffer_size: usize,
    limit: Option<u64>,
    cancel: &CancellationToken,
    mut on_written: impl FnMut(u64),
) -> Result<u64, FetchError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut written: u64 = 0;

    loop {
        let want = match limit {
            Some(limit) if written >= limit => break,
            Some(limit) => buffer.len().min(usize::try_from(limit - written).unwrap_or(usize::MAX)),
            None => buffer.len(),
        };

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            read = reader.read(&mut buffer[..want]) => read.map_err(FetchError::from_stream_io)?,
        };
        if read == 0 {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = writer.write_all(&buffer[..read]) => result?,
        }

        written += read as u64;
        on_written(written);
    }

    Ok(written)
}
