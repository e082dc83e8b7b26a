//! Per-file reports and the run summary.
//!
//! - File-level: `FileReport`, produced by the processor
//! - Run-level: `RunSummary`, aggregated by the scheduler
//! - Plan: `plan_table` renders `FilePlan`s for `status` and `--dry-run`

use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use promptline_core::progress::fmt_num;
use promptline_store::Response;

use crate::scheduler::{FilePlan, FileStatus};

// =============================================================================
// File-level
// =============================================================================

/// What one `FileProcessor::process` call did.
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    pub file: String,
    /// Items in the input dataset
    pub items: usize,
    /// Items chosen for this invocation
    pub selected: usize,
    /// Items sent to the API before finishing or stopping
    pub attempted: usize,
    pub succeeded: usize,
    /// Answered only after shrinking the prompt
    pub degraded: usize,
    pub too_short: usize,
    /// Generic failures still eligible for a later run
    pub failed: usize,
    /// Reached the fail-count cap in this run
    pub skipped: usize,
    pub flushes: usize,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl FileReport {
    pub fn new(file: &str, items: usize, selected: usize) -> Self {
        Self {
            file: file.to_string(),
            items,
            selected,
            ..Default::default()
        }
    }

    /// Count one freshly recorded response.
    pub fn tally(&mut self, response: &Response) {
        self.attempted += 1;
        match response {
            Response::Success { degraded, .. } => {
                self.succeeded += 1;
                if *degraded > 0 {
                    self.degraded += 1;
                }
            }
            Response::TooShort { .. } => self.too_short += 1,
            Response::RequestFailed { .. } => self.failed += 1,
            Response::Skipped { .. } => self.skipped += 1,
            Response::Pending => {}
        }
    }

    /// Log file completion (non-TTY mode only).
    pub fn log(&self) {
        if self.selected == 0 {
            log::info!("{}: already complete", self.file);
            return;
        }
        log::info!(
            "{}: {}/{} ok, {} too short, {} failed, {} skipped [{:.1}s]{}",
            self.file,
            self.succeeded,
            self.attempted,
            self.too_short,
            self.failed,
            self.skipped,
            self.elapsed.as_secs_f64(),
            if self.interrupted { " (interrupted)" } else { "" }
        );
    }
}

// =============================================================================
// Run-level
// =============================================================================

/// Aggregated outcome of one `WorkScheduler::run`.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Input files discovered
    pub files_total: usize,
    /// Already complete before the run started
    pub files_complete: usize,
    pub files_processed: usize,
    /// Unreadable at planning time or failed while processing
    pub files_failed: usize,
    pub workers: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub degraded: usize,
    pub too_short: usize,
    pub failed: usize,
    pub skipped: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
    /// `(file, error)` for every failed file
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    pub fn add_report(&mut self, report: &FileReport) {
        self.files_processed += 1;
        self.attempted += report.attempted;
        self.succeeded += report.succeeded;
        self.degraded += report.degraded;
        self.too_short += report.too_short;
        self.failed += report.failed;
        self.skipped += report.skipped;
        self.interrupted |= report.interrupted;
    }

    pub fn add_failure(&mut self, file: &str, error: impl std::fmt::Display) {
        self.files_failed += 1;
        self.failures.push((file.to_string(), error.to_string()));
    }

    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Run Summary")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
                Cell::new("%").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Files"),
            Cell::new(format!(
                "{} processed, {} already complete, {} failed / {}",
                self.files_processed, self.files_complete, self.files_failed, self.files_total
            )),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Items attempted"),
            Cell::new(fmt_num(self.attempted)),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Answered").fg(Color::Green),
            Cell::new(fmt_num(self.succeeded)).fg(Color::Green),
            Cell::new(format!("{:.1}", pct(self.succeeded, self.attempted))).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("  after shrinking"),
            Cell::new(fmt_num(self.degraded)),
            Cell::new(format!("{:.1}", pct(self.degraded, self.attempted))),
        ]);
        table.add_row(vec![
            Cell::new("Too short"),
            Cell::new(fmt_num(self.too_short)),
            Cell::new(format!("{:.1}", pct(self.too_short, self.attempted))),
        ]);
        table.add_row(vec![
            Cell::new("Failed (will retry)").fg(Color::Yellow),
            Cell::new(fmt_num(self.failed)).fg(Color::Yellow),
            Cell::new(format!("{:.1}", pct(self.failed, self.attempted))),
        ]);
        table.add_row(vec![
            Cell::new("Skipped (fail cap)").fg(Color::Red),
            Cell::new(fmt_num(self.skipped)).fg(Color::Red),
            Cell::new(format!("{:.1}", pct(self.skipped, self.attempted))),
        ]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!(
                "{:.1}s ({} workers)",
                self.elapsed.as_secs_f64(),
                self.workers
            )),
            Cell::new(""),
        ]);

        for (file, error) in &self.failures {
            table.add_row(vec![
                Cell::new(file).fg(Color::Red),
                Cell::new(error),
                Cell::new(""),
            ]);
        }

        format!("\n{table}")
    }

    /// Print the summary table (TTY mode).
    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "Run {}: {} files processed, {} failed, {} already complete; {} answered, {} too short, {} failed, {} skipped [{:.1}s]",
            if self.interrupted { "interrupted" } else { "finished" },
            self.files_processed,
            self.files_failed,
            self.files_complete,
            fmt_num(self.succeeded),
            fmt_num(self.too_short),
            fmt_num(self.failed),
            fmt_num(self.skipped),
            self.elapsed.as_secs_f64()
        );
        for (file, error) in &self.failures {
            log::error!("{file}: {error}");
        }
    }
}

// =============================================================================
// Plan
// =============================================================================

/// Per-file table of what a run would do.
pub fn plan_table(plans: &[FilePlan]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            [
                "File", "Items", "Done", "Failed", "Too short", "Skipped", "Missing", "State",
            ]
            .into_iter()
            .map(|h| Cell::new(h).fg(Color::Cyan)),
        );

    for plan in plans {
        match &plan.status {
            FileStatus::Ready(t) => {
                let state = if t.remaining == 0 {
                    Cell::new("complete").fg(Color::Green)
                } else {
                    Cell::new(format!("{} to do", fmt_num(t.remaining))).fg(Color::Yellow)
                };
                table.add_row(vec![
                    Cell::new(&plan.name),
                    Cell::new(fmt_num(t.items)),
                    Cell::new(fmt_num(t.done)),
                    Cell::new(fmt_num(t.failed)),
                    Cell::new(fmt_num(t.too_short)),
                    Cell::new(fmt_num(t.skipped)),
                    Cell::new(fmt_num(t.missing)),
                    state,
                ]);
            }
            FileStatus::Unreadable(error) => {
                let mut row = vec![Cell::new(&plan.name).fg(Color::Red)];
                row.extend((0..6).map(|_| Cell::new("-")));
                row.push(Cell::new(error).fg(Color::Red));
                table.add_row(row);
            }
        }
    }

    format!("{table}")
}

/// Calculate percentage safely.
fn pct(part: usize, total: usize) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}
