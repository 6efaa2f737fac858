//! Remaining-time estimator
//!
//! Average throughput since `start` is projected over the bytes still
//! missing. No estimate is given until enough time has passed and enough
//! data has moved to make the average meaningful.

use std::time::Duration;
use tokio::time::Instant;

/// Below this much elapsed time no estimate is produced
pub const MIN_ELAPSED: Duration = Duration::from_millis(500);

/// Below this average throughput (bytes/sec) no estimate is produced
pub const MIN_THROUGHPUT: f64 = 1.0;

/// Upper bound for estimates, used instead of overflowing
pub const MAX_ESTIMATE: Duration = Duration::from_secs(u32::MAX as u64);

/// Throughput-based estimator for one transfer
#[derive(Debug, Default)]
pub struct SpeedEstimator {
    state: Option<EstimatorState>,
}

#[derive(Debug)]
struct EstimatorState {
    /// When timing started
    started_at: Instant,
    /// Bytes already present when timing started
    initial_bytes: u64,
    /// Total size of the transfer
    total_size: u64,
    /// Latest reported byte count
    current_bytes: u64,
}

impl SpeedEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin (or restart) timing. Bytes present before the transfer
    /// don't count towards throughput.
    pub fn start(&mut self, total_size: u64, initial_bytes: u64) {
        self.state = Some(EstimatorState {
            started_at: Instant::now(),
            initial_bytes,
            total_size,
            current_bytes: initial_bytes,
        });
    }

    pub fn update(&mut self, current_bytes: u64) {
        if let Some(state) = self.state.as_mut() {
            state.current_bytes = current_bytes;
        }
    }

    pub fn stop(&mut self) {
        self.state = None;
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    /// Average bytes per second since `start`
    pub fn bytes_per_second(&self) -> Option<f64> {
        let state = self.state.as_ref()?;
        let elapsed = state.started_at.elapsed();
        if elapsed < MIN_ELAPSED {
            return None;
        }
        let transferred = state.current_bytes.saturating_sub(state.initial_bytes);
        Some(transferred as f64 / elapsed.as_secs_f64())
    }

    pub fn estimate_remaining(&self) -> Option<Duration> {
        let state = self.state.as_ref()?;
        let remaining = state.total_size.saturating_sub(state.current_bytes);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }

        let speed = self.bytes_per_second()?;
        if speed < MIN_THROUGHPUT {
            return None;
        }

        let secs = remaining as f64 / speed;
        let estimate = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        Some(estimate.min(MAX_ESTIMATE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_no_estimate_before_min_elapsed() {
        let mut estimator = SpeedEstimator::new();
        estimator.start(1000, 0);
        estimator.update(500);
        advance(Duration::from_millis(100)).await;
        assert!(estimator.estimate_remaining().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_estimate() {
        let mut estimator = SpeedEstimator::new();
        estimator.start(1000, 0);
        advance(Duration::from_secs(2)).await;
        estimator.update(200);

        // 100 B/s, 800 bytes left
        let eta = estimator.estimate_remaining().unwrap();
        assert_eq!(eta.as_secs(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumed_bytes_excluded_from_speed() {
        let mut estimator = SpeedEstimator::new();
        estimator.start(1000, 600);
        advance(Duration::from_secs(1)).await;
        estimator.update(700);

        assert_eq!(estimator.bytes_per_second(), Some(100.0));
        assert_eq!(estimator.estimate_remaining().unwrap().as_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_transfer_has_no_estimate() {
        let mut estimator = SpeedEstimator::new();
        estimator.start(1000, 0);
        advance(Duration::from_secs(10)).await;
        assert!(estimator.estimate_remaining().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_is_zero() {
        let mut estimator = SpeedEstimator::new();
        estimator.start(1000, 1000);
        assert_eq!(estimator.estimate_remaining(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_remaining_saturates() {
        let mut estimator = SpeedEstimator::new();
        estimator.start(u64::MAX, 0);
        advance(Duration::from_secs(1)).await;
        estimator.update(1);
        assert_eq!(estimator.estimate_remaining(), Some(MAX_ESTIMATE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears() {
        let mut estimator = SpeedEstimator::new();
        estimator.start(10, 0);
        assert!(estimator.is_running());
        estimator.stop();
        assert!(!estimator.is_running());
        assert!(estimator.estimate_remaining().is_none());
    }
}
