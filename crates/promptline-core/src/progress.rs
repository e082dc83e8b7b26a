//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif bar per worker, re-targeted at each file.
//! Non-TTY mode: log-based output (no progress bars).

use std::io::IsTerminal;
use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Per-worker item bar
fn bar_style() -> Option<ProgressStyle> {
    ProgressStyle::default_bar()
        .template("{prefix:<6.cyan} {bar:30.green/dim} {pos:>5}/{len:5} {elapsed:>4} {wide_msg:.dim}")
        .ok()
        .map(|s| s.progress_chars("--"))
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
        }
    }

    /// Context that never draws bars (library use, tests, piped output).
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: false,
        }
    }

    /// Create a per-worker progress bar.
    ///
    /// TTY: visible bar, length set per file with [`start_file`].
    /// Non-TTY: hidden (no-op).
    pub fn worker_bar(&self, tag: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }

        let pb = self.multi.add(ProgressBar::new(0));
        if let Some(style) = bar_style() {
            pb.set_style(style);
        }
        pb.set_prefix(tag.to_string());
        pb
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Reset a worker bar for a new file with `total` selected items.
pub fn start_file(pb: &ProgressBar, file_name: &str, total: usize) {
    pb.reset();
    pb.set_length(total as u64);
    pb.set_position(0);
    pb.set_message(file_name.to_string());
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_small() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(7), "7");
        assert_eq!(fmt_num(999), "999");
    }

    #[test]
    fn fmt_num_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(25_310), "25,310");
        assert_eq!(fmt_num(1_234_567), "1,234,567");
    }

    #[test]
    fn hidden_context_hands_out_hidden_bars() {
        let progress = ProgressContext::hidden();
        assert!(!progress.is_tty());
        let pb = progress.worker_bar("w1");
        assert!(pb.is_hidden());
    }

    #[test]
    fn start_file_sets_length() {
        let pb = ProgressBar::hidden();
        pb.set_position(5);
        start_file(&pb, "age_changed.json", 12);
        assert_eq!(pb.length(), Some(12));
        assert_eq!(pb.position(), 0);
    }
}
