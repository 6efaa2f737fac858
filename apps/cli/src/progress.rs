//! Progress sinks for CLI downloads

use crate::output::format_eta;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reget_core::{FileProgress, ProgressSink};
use std::sync::Mutex;

/// Progress bar on stdout; logs stay on stderr
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stdout());
        let template = "{spinner:.green} {msg} [{bar:40.cyan/blue}] \
                        {bytes}/{total_bytes} ({bytes_per_sec}, {prefix})";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("█▓▒░  "));
        }
        bar.set_message(label.to_string());
        bar.set_prefix("--");
        Self { bar }
    }

    pub fn finish(&self, message: String) {
        self.bar.finish_with_message(message);
    }

    pub fn abandon(&self, message: String) {
        self.bar.abandon_with_message(message);
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, progress: &FileProgress) {
        if let Some(total) = progress.total_size {
            if self.bar.length() != Some(total) {
                self.bar.set_length(total);
            }
        }
        self.bar.set_position(progress.bytes_downloaded);
        let eta = progress
            .estimated_remaining
            .map(|d| format_eta(d.as_secs()))
            .unwrap_or_else(|| "--".to_string());
        self.bar.set_prefix(eta);
    }
}

/// One JSON line per whole percent
#[derive(Default)]
pub struct JsonProgress {
    last_percent: Mutex<Option<u64>>,
}

impl ProgressSink for JsonProgress {
    fn report(&self, progress: &FileProgress) {
        let percent = progress.percent.map(|p| p.floor() as u64);
        let Ok(mut last) = self.last_percent.lock() else {
            return;
        };
        if last.is_some() && *last == percent {
            return;
        }
        *last = percent;

        if let Ok(line) = serde_json::to_string(progress) {
            println!("{line}");
        }
    }
}
