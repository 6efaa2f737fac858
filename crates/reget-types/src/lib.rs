//! Shared types for reget
//!
//! This crate contains the plain data structures shared between
//! the download engine and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Options
// ============================================================================

/// Default number of additional attempts after the first failed call
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default delay before the first retry
pub const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Default ceiling for the exponential backoff
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
/// Default byte-range window for chunked downloads (1 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
/// Default read buffer (80 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 80 * 1024;

/// Engine configuration, fixed at construction time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    /// Retries after the first attempt (total calls = max_retries + 1)
    pub max_retries: u32,
    #[serde(rename = "initial_retry_delay_ms", with = "duration_ms")]
    pub initial_retry_delay: Duration,
    #[serde(rename = "max_retry_delay_ms", with = "duration_ms")]
    pub max_retry_delay: Duration,
    /// Size of each byte-range request in chunked mode
    pub chunk_size: u64,
    /// Size of the buffer used to stream bodies and hash files
    pub buffer_size: usize,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_retry_delay: DEFAULT_INITIAL_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl DownloadOptions {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn initial_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Clamp degenerate values so the engine never loops on empty windows
    pub fn validate(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        self.buffer_size = self.buffer_size.max(1);
        if self.max_retry_delay < self.initial_retry_delay {
            self.max_retry_delay = self.initial_retry_delay;
        }
        self
    }
}

/// Durations are stored as whole milliseconds in config files
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Progress
// ============================================================================

/// A single progress observation for one download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProgress {
    pub total_size: Option<u64>,
    pub bytes_downloaded: u64,
    /// 0.0..=100.0, absent while the size is unknown
    pub percent: Option<f64>,
    #[serde(rename = "estimated_remaining_secs", with = "optional_secs", default)]
    pub estimated_remaining: Option<Duration>,
}

impl FileProgress {
    pub fn new(total_size: Option<u64>, bytes_downloaded: u64) -> Self {
        let percent = total_size.map(|total| {
            if total == 0 {
                100.0
            } else {
                (bytes_downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
            }
        });

        Self {
            total_size,
            bytes_downloaded,
            percent,
            estimated_remaining: None,
        }
    }

    pub fn with_estimate(mut self, estimate: Option<Duration>) -> Self {
        self.estimated_remaining = estimate;
        self
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total_size, Some(total) if self.bytes_downloaded >= total)
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<f64> = Option::deserialize(deserializer)?;
        Ok(secs.and_then(|s| Duration::try_from_secs_f64(s).ok()))
    }
}

// ============================================================================
// Ranges and checksums
// ============================================================================

/// Inclusive byte range `[from, to]` of the remote file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRange {
    pub from: u64,
    pub to: u64,
}

impl ChunkRange {
    /// Next window starting at `offset`, at most `chunk_size` bytes, never past `total`.
    /// Returns `None` once `offset` has reached `total`.
    pub fn next_window(offset: u64, chunk_size: u64, total: u64) -> Option<Self> {
        if offset >= total || chunk_size == 0 {
            return None;
        }
        let to = offset.saturating_add(chunk_size - 1).min(total - 1);
        Some(Self { from: offset, to })
    }

    /// Number of bytes covered (ranges are inclusive and never empty)
    pub fn byte_count(&self) -> u64 {
        self.to - self.from + 1
    }

    /// Value for the HTTP `Range` header
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.from, self.to)
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Digest algorithm of a server-supplied checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    pub fn digest_len(&self) -> usize {
        match self {
            ChecksumAlgorithm::Md5 => 16,
            ChecksumAlgorithm::Sha256 => 32,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAlgorithm::Md5 => write!(f, "md5"),
            ChecksumAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Checksum the downloaded file must match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedChecksum {
    pub algorithm: ChecksumAlgorithm,
    pub digest: Vec<u8>,
}

impl ExpectedChecksum {
    pub fn md5(digest: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Md5,
            digest: digest.into(),
        }
    }

    pub fn sha256(digest: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Sha256,
            digest: digest.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_window_clamps_to_total() {
        assert_eq!(
            ChunkRange::next_window(0, 10, 25),
            Some(ChunkRange { from: 0, to: 9 })
        );
        assert_eq!(
            ChunkRange::next_window(20, 10, 25),
            Some(ChunkRange { from: 20, to: 24 })
        );
        assert_eq!(ChunkRange::next_window(25, 10, 25), None);
        assert_eq!(ChunkRange::next_window(0, 10, 0), None);
    }

    #[test]
    fn test_range_header() {
        let range = ChunkRange { from: 1024, to: 2047 };
        assert_eq!(range.header_value(), "bytes=1024-2047");
        assert_eq!(range.byte_count(), 1024);
    }

    #[test]
    fn test_progress_percent() {
        let p = FileProgress::new(Some(200), 50);
        assert_eq!(p.percent, Some(25.0));
        assert!(!p.is_complete());

        assert_eq!(FileProgress::new(Some(0), 0).percent, Some(100.0));
        assert_eq!(FileProgress::new(None, 10).percent, None);
        assert!(FileProgress::new(Some(10), 10).is_complete());
    }

    #[test]
    fn test_options_partial_json() {
        let options: DownloadOptions =
            serde_json::from_str(r#"{"max_retries": 9, "initial_retry_delay_ms": 250}"#).unwrap();
        assert_eq!(options.max_retries, 9);
        assert_eq!(options.initial_retry_delay, Duration::from_millis(250));
        assert_eq!(options.max_retry_delay, DEFAULT_MAX_RETRY_DELAY);
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_options_validate() {
        let options = DownloadOptions::default()
            .chunk_size(0)
            .buffer_size(0)
            .initial_retry_delay(Duration::from_secs(10))
            .max_retry_delay(Duration::from_secs(1))
            .validate();
        assert_eq!(options.chunk_size, 1);
        assert_eq!(options.buffer_size, 1);
        assert_eq!(options.max_retry_delay, Duration::from_secs(10));
    }
}
