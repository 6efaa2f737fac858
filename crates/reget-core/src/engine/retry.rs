//! Retry executor with exponential backoff
//!
//! Wraps one network call. Success and "range not satisfiable" come back
//! immediately, as does any status that retrying cannot fix. 5xx, 408, 429
//! and transient transport errors are retried with a doubling delay capped
//! at `max_delay`. Cancellation aborts at once, including mid-delay.

use crate::error::{FetchError, TransportError};
use crate::transport::StatusResponse;
use reget_types::DownloadOptions;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Statuses that are worth another attempt
pub(crate) fn is_retriable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Bounded retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl From<&DownloadOptions> for RetryPolicy {
    fn from(options: &DownloadOptions) -> Self {
        Self {
            max_retries: options.max_retries,
            initial_delay: options.initial_retry_delay,
            max_delay: options.max_retry_delay,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), doubling and capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(retry);
        self.initial_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    /// Run `call` until it yields a response that should not be retried.
    ///
    /// After the last retry a status response is returned as-is for the
    /// caller to interpret; a transport error is returned as `Err`, with
    /// timeouts mapped to [`FetchError::Timeout`].
    pub async fn execute<R, F, Fut>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<R, FetchError>
    where
        R: StatusResponse,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, TransportError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                result = call() => result,
            };

            let reason = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if !is_retriable_status(status) {
                        if attempt > 0 && status.is_success() {
                            info!(operation, attempts = attempt + 1, "Call succeeded after retry");
                        }
                        return Ok(response);
                    }
                    if attempt >= self.max_retries {
                        error!(
                            operation,
                            %status,
                            attempts = attempt + 1,
                            "Call failed after all retry attempts exhausted"
                        );
                        return Ok(response);
                    }
                    // Release the connection before waiting
                    drop(response);
                    format!("status {status}")
                }
                Err(e) => {
                    if !e.is_retryable() {
                        warn!(operation, error = %e, "Call failed with non-retryable error");
                        return Err(e.into());
                    }
                    if attempt >= self.max_retries {
                        error!(
                            operation,
                            error = %e,
                            attempts = attempt + 1,
                            "Call failed after all retry attempts exhausted"
                        );
                        return Err(match e {
                            TransportError::Timeout(_) => FetchError::Timeout,
                            other => FetchError::Transport(other),
                        });
                    }
                    e.to_string()
                }
            };

            let delay = self.delay_for(attempt);
            attempt += 1;
            warn!(
                operation,
                attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                %reason,
                "Call failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
