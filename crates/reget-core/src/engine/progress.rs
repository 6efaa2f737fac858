//! Progress reporting
//!
//! A [`ProgressSink`] receives snapshots synchronously on the download task.
//! Each call to the downloader owns its own [`ProgressTracker`], so several
//! downloads can share one downloader without sharing timing state.
//!
//! The byte count a sink sees never goes down, even when the transfer
//! restarts from zero after progress was already reported.

use super::estimator::SpeedEstimator;
use reget_types::FileProgress;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Receiver of progress snapshots
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &FileProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&FileProgress) + Send + Sync,
{
    fn report(&self, progress: &FileProgress) {
        self(progress)
    }
}

/// Sink that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &FileProgress) {}
}

/// Per-download progress state
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    estimator: SpeedEstimator,
    total_size: u64,
    last_reported: Option<u64>,
    high_water: u64,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            estimator: SpeedEstimator::new(),
            total_size: 0,
            last_reported: None,
            high_water: 0,
        }
    }

    /// Reset timing for a transfer of `total_size` bytes with
    /// `initial_bytes` already on disk
    ///
    /// Bytes reported before a restart stay the floor for later reports,
    /// lowered only if the new total is smaller.
    pub fn start(&mut self, total_size: u64, initial_bytes: u64) {
        self.total_size = total_size;
        self.high_water = self.high_water.min(total_size);
        self.last_reported = None;
        self.estimator.start(total_size, initial_bytes);
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Send a snapshot for `bytes_downloaded`, clamped to the total.
    /// Counts below what the sink already saw only feed the estimator.
    pub fn report(&mut self, bytes_downloaded: u64) {
        let bytes = bytes_downloaded.min(self.total_size);
        self.estimator.update(bytes);
        if bytes < self.high_water {
            return;
        }
        self.high_water = bytes;
        self.last_reported = Some(bytes);

        let progress = FileProgress::new(Some(self.total_size), bytes)
            .with_estimate(self.estimator.estimate_remaining());

        let sink = self.sink;
        if catch_unwind(AssertUnwindSafe(|| sink.report(&progress))).is_err() {
            warn!(bytes, "Progress sink panicked, ignoring");
        }
    }

    /// Report 100% unless that was the last thing reported
    pub fn finish(&mut self) {
        if self.last_reported != Some(self.total_size) {
            self.report(self.total_size);
        }
    }
}

impl Drop for ProgressTracker<'_> {
    fn drop(&mut self) {
        self.estimator.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_reports_are_clamped_to_total() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: &FileProgress| seen.lock().unwrap().push(p.clone());

        let mut tracker = ProgressTracker::new(&sink);
        tracker.start(100, 0);
        tracker.report(40);
        tracker.report(150);
        drop(tracker);

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].bytes_downloaded, 40);
        assert_eq!(seen[0].percent, Some(40.0));
        assert_eq!(seen[1].bytes_downloaded, 100);
        assert!(seen[1].is_complete());
        assert_eq!(seen[1].estimated_remaining, Some(std::time::Duration::ZERO));
    }

    #[test]
    fn test_finish_does_not_duplicate() {
        let count = Mutex::new(0);
        let sink = |_: &FileProgress| *count.lock().unwrap() += 1;

        let mut tracker = ProgressTracker::new(&sink);
        tracker.start(10, 0);
        tracker.report(10);
        tracker.finish();
        drop(tracker);
        assert_eq!(*count.lock().unwrap(), 1);

        let mut tracker = ProgressTracker::new(&sink);
        tracker.start(10, 0);
        tracker.report(5);
        tracker.finish();
        drop(tracker);
        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[test]
    fn test_restart_never_reports_backwards() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: &FileProgress| seen.lock().unwrap().push(p.bytes_downloaded);

        let mut tracker = ProgressTracker::new(&sink);
        tracker.start(300, 150);
        tracker.report(150);
        tracker.start(300, 0);
        for bytes in [0, 50, 100, 149, 150, 200, 300] {
            tracker.report(bytes);
        }
        tracker.finish();
        drop(tracker);

        assert_eq!(seen.into_inner().unwrap(), vec![150, 150, 200, 300]);
    }

    #[test]
    fn test_restart_with_smaller_total_lowers_floor() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: &FileProgress| seen.lock().unwrap().push(p.bytes_downloaded);

        let mut tracker = ProgressTracker::new(&sink);
        tracker.start(300, 0);
        tracker.report(250);
        tracker.start(100, 0);
        tracker.report(100);
        tracker.finish();
        drop(tracker);

        assert_eq!(seen.into_inner().unwrap(), vec![250, 100]);
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let sink = |_: &FileProgress| panic!("observer failure");
        let mut tracker = ProgressTracker::new(&sink);
        tracker.start(10, 0);
        tracker.report(5);
        tracker.finish();
    }

    #[test]
    fn test_no_progress_sink() {
        let mut tracker = ProgressTracker::new(&NoProgress);
        tracker.start(0, 0);
        tracker.finish();
        assert_eq!(tracker.total_size(), 0);
    }
}
