//! Error types for reget core

use thiserror::Error;

/// Failure of a single call on the network capability
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    Request(String),
}

impl TransportError {
    /// Timeouts and connection-level failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Network(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(error.to_string())
        } else if error.is_builder() {
            TransportError::Request(error.to_string())
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

/// Errors that can occur inside the download engine
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download was cancelled")]
    Cancelled,

    #[error("Timeout")]
    Timeout,
}

impl FetchError {
    /// Cancellation and timeout are surfaced to the caller as-is,
    /// everything else collapses into an ordinary failure
    pub fn interruption(&self) -> Option<Interrupted> {
        match self {
            FetchError::Cancelled => Some(Interrupted::Cancelled),
            FetchError::Timeout => Some(Interrupted::TimedOut),
            _ => None,
        }
    }

    /// Classify a body read/write failure
    pub(crate) fn from_stream_io(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::TimedOut {
            FetchError::Timeout
        } else {
            FetchError::Io(error)
        }
    }
}

/// The two outcomes of a download that are not plain success or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("Download was cancelled")]
    Cancelled,

    #[error("Download timed out")]
    TimedOut,
}

impl From<Interrupted> for FetchError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => FetchError::Cancelled,
            Interrupted::TimedOut => FetchError::Timeout,
        }
    }
}
