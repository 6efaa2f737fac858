//! Scripted in-memory transport for driving `FileDownloader` in tests

#![allow(dead_code)]

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reget_core::transport::BodyStream;
use reget_core::{
    CancellationToken, ChunkRange, ContentResponse, DownloadOptions, ExpectedChecksum,
    RemoteMetadata, Transport, TransportError,
};
use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

pub const URL: &str = "http://files.test/archive.bin";

/// One call made against the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Metadata,
    Content,
    Range(ChunkRange),
}

/// Where the transport fires the cancellation token
#[derive(Debug, Clone, Copy)]
pub enum CancelPoint {
    /// After the first piece of the full body
    ContentBody,
    /// After the first piece of the n-th range body (1-based)
    RangeBody(usize),
}

/// Deterministic test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn md5_of(data: &[u8]) -> ExpectedChecksum {
    ExpectedChecksum::md5(md5::compute(data).0.to_vec())
}

/// Options with tiny delays so retry tests run fast
pub fn fast_options(chunk_size: u64, max_retries: u32) -> DownloadOptions {
    DownloadOptions::default()
        .chunk_size(chunk_size)
        .buffer_size(16)
        .max_retries(max_retries)
        .initial_retry_delay(Duration::from_millis(1))
        .max_retry_delay(Duration::from_millis(4))
}

pub struct MockTransport {
    data: Vec<u8>,
    range_supported: bool,
    announced_size: Option<u64>,
    checksum: Option<ExpectedChecksum>,
    metadata_status: StatusCode,
    content_error: Option<TransportError>,
    /// Ranges starting at or after this offset get this status
    range_failure: Option<(u64, StatusCode)>,
    ignore_ranges: bool,
    /// Ranges starting at or after this offset get an empty 206 body
    empty_ranges_from: Option<u64>,
    /// Range bodies run to the end of the file instead of the window end
    overdeliver: bool,
    /// Written in full right before a 416 goes out, as another writer would
    completed_by_other: Option<PathBuf>,
    cancel_at: Option<(CancelPoint, CancellationToken)>,
    piece_size: usize,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new(data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self {
            data,
            range_supported: true,
            announced_size: Some(size),
            checksum: None,
            metadata_status: StatusCode::OK,
            content_error: None,
            range_failure: None,
            ignore_ranges: false,
            empty_ranges_from: None,
            overdeliver: false,
            completed_by_other: None,
            cancel_at: None,
            piece_size: 10,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_ranges(mut self) -> Self {
        self.range_supported = false;
        self
    }

    pub fn announced_size(mut self, size: Option<u64>) -> Self {
        self.announced_size = size;
        self
    }

    pub fn checksum(mut self, checksum: ExpectedChecksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn metadata_status(mut self, status: StatusCode) -> Self {
        self.metadata_status = status;
        self
    }

    pub fn content_error(mut self, error: TransportError) -> Self {
        self.content_error = Some(error);
        self
    }

    pub fn fail_ranges_from(mut self, offset: u64, status: StatusCode) -> Self {
        self.range_failure = Some((offset, status));
        self
    }

    pub fn ignore_ranges(mut self) -> Self {
        self.ignore_ranges = true;
        self
    }

    pub fn empty_ranges_from(mut self, offset: u64) -> Self {
        self.empty_ranges_from = Some(offset);
        self
    }

    pub fn overdeliver_ranges(mut self) -> Self {
        self.overdeliver = true;
        self
    }

    pub fn complete_file_before_unsatisfiable(mut self, path: PathBuf) -> Self {
        self.completed_by_other = Some(path);
        self
    }

    pub fn cancel_at(mut self, point: CancelPoint, token: CancellationToken) -> Self {
        self.cancel_at = Some((point, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn range_calls(&self) -> Vec<ChunkRange> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Range(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        calls.iter().filter(|c| matches!(c, Call::Range(_))).count()
    }

    fn body(&self, bytes: &[u8], cancel: Option<CancellationToken>) -> BodyStream {
        let pieces: Vec<io::Result<Bytes>> = bytes
            .chunks(self.piece_size)
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();

        match cancel {
            None => Box::pin(stream::iter(pieces)),
            Some(token) => {
                let first = pieces.into_iter().take(1);
                let stall = stream::once(async move {
                    token.cancel();
                    std::future::pending::<io::Result<Bytes>>().await
                });
                Box::pin(stream::iter(first).chain(stall))
            }
        }
    }

    fn response(
        &self,
        status: StatusCode,
        bytes: &[u8],
        total: Option<u64>,
        cancel: Option<CancellationToken>,
    ) -> ContentResponse {
        ContentResponse {
            status,
            content_length: Some(bytes.len() as u64),
            content_range_total: total,
            body: self.body(bytes, cancel),
        }
    }
}

impl Transport for MockTransport {
    async fn fetch_metadata(&self, _url: &str) -> Result<RemoteMetadata, TransportError> {
        self.record(Call::Metadata);
        Ok(RemoteMetadata {
            status: self.metadata_status,
            range_supported: self.range_supported,
            content_length: self.announced_size,
            checksum: self.checksum.clone(),
        })
    }

    async fn fetch_content(&self, _url: &str) -> Result<ContentResponse, TransportError> {
        self.record(Call::Content);
        if let Some(error) = &self.content_error {
            return Err(error.clone());
        }

        let cancel = match &self.cancel_at {
            Some((CancelPoint::ContentBody, token)) => Some(token.clone()),
            _ => None,
        };
        Ok(self.response(StatusCode::OK, &self.data, None, cancel))
    }

    async fn fetch_range(
        &self,
        _url: &str,
        range: ChunkRange,
    ) -> Result<ContentResponse, TransportError> {
        let nth = self.record(Call::Range(range));
        let total = self.data.len() as u64;

        if self.ignore_ranges {
            return Ok(self.response(StatusCode::OK, &self.data, None, None));
        }
        if let Some((offset, status)) = self.range_failure {
            if range.from >= offset {
                if status == StatusCode::RANGE_NOT_SATISFIABLE {
                    if let Some(path) = &self.completed_by_other {
                        std::fs::write(path, &self.data).unwrap();
                    }
                }
                return Ok(self.response(status, b"", None, None));
            }
        }
        if range.from >= total {
            let status = StatusCode::RANGE_NOT_SATISFIABLE;
            return Ok(self.response(status, b"", Some(total), None));
        }
        if self.empty_ranges_from.is_some_and(|offset| range.from >= offset) {
            return Ok(self.response(StatusCode::PARTIAL_CONTENT, b"", Some(total), None));
        }

        let end = if self.overdeliver {
            total as usize
        } else {
            (range.to + 1).min(total) as usize
        };
        let slice = &self.data[range.from as usize..end];
        let cancel = match &self.cancel_at {
            Some((CancelPoint::RangeBody(n), token)) if *n == nth => Some(token.clone()),
            _ => None,
        };
        Ok(self.response(StatusCode::PARTIAL_CONTENT, slice, Some(total), cancel))
    }
}
