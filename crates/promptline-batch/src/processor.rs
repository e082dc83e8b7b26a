//! Resumable processing of one input file into its result file
//!
//! Items still needing an answer are computed once, then sent in batches.
//! The full record set is flushed after each batch, so a crash loses at
//! most one batch and never touches a terminal record.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use indicatif::ProgressBar;
use promptline_core::progress::start_file;
use promptline_store::{AnswerTable, RecordStore, StoreError, load_work_items};

use crate::client::{CompletionClient, Policy};
use crate::stats::FileReport;

/// Why a file could not be processed
#[derive(Debug)]
pub enum ProcessError {
    Input(StoreError),
    /// Existing result file unreadable or corrupt
    Output(StoreError),
    Flush(StoreError),
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input(e) => write!(f, "cannot load input: {e}"),
            Self::Output(e) => write!(f, "cannot load existing results: {e}"),
            Self::Flush(e) => write!(f, "cannot save results: {e}"),
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Input(e) | Self::Output(e) | Self::Flush(e) => Some(e),
        }
    }
}

/// Processes files one at a time for a single worker.
pub struct FileProcessor<'a> {
    client: &'a CompletionClient,
    answers: &'a AnswerTable,
    policy: Policy,
    max_fail_count: u32,
    batch_size: usize,
    shutdown: &'a AtomicBool,
}

impl<'a> FileProcessor<'a> {
    pub fn new(
        client: &'a CompletionClient,
        answers: &'a AnswerTable,
        policy: Policy,
        max_fail_count: u32,
        batch_size: usize,
        shutdown: &'a AtomicBool,
    ) -> Self {
        Self {
            client,
            answers,
            policy,
            max_fail_count,
            batch_size: batch_size.max(1),
            shutdown,
        }
    }

    /// Bring `output` up to date with `input`.
    ///
    /// Stops early, after flushing, once shutdown is requested; the report
    /// is then marked interrupted.
    pub fn process(
        &self,
        input: &Path,
        output: &Path,
        pb: &ProgressBar,
    ) -> Result<FileReport, ProcessError> {
        let started = Instant::now();
        let name = file_label(input);

        let items = load_work_items(input).map_err(ProcessError::Input)?;
        let mut store = RecordStore::load(output).map_err(ProcessError::Output)?;
        let selected = store.select(&items, self.max_fail_count);

        let mut report = FileReport::new(&name, items.len(), selected.len());
        if selected.is_empty() {
            log::debug!("{name}: nothing to do ({} items)", items.len());
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        log::info!(
            "{name}: {} of {} items to process ({})",
            selected.len(),
            items.len(),
            self.policy
        );
        start_file(pb, &name, selected.len());

        let batches = selected.len().div_ceil(self.batch_size);
        for (batch_idx, batch) in selected.chunks(self.batch_size).enumerate() {
            let mut touched = 0usize;
            for item in batch {
                if self.shutdown.load(Ordering::Relaxed) {
                    report.interrupted = true;
                    break;
                }
                let answer = self.answers.true_answer(&item.id);
                let mut record = store.merge(item, &answer, self.max_fail_count);
                let outcome = self.client.execute(&item.prompt, self.policy);
                record.record_outcome(outcome.into(), self.max_fail_count);
                log::debug!("{name}: {} -> {}", item.key(), record.response);

                report.tally(&record.response);
                store.upsert(record);
                touched += 1;
                pb.inc(1);
            }

            if touched > 0 {
                store.flush().map_err(ProcessError::Flush)?;
                report.flushes += 1;
                if pb.is_hidden() {
                    log::info!(
                        "{name}: batch {}/{batches} saved ({}/{})",
                        batch_idx + 1,
                        report.attempted,
                        report.selected
                    );
                }
            }
            if report.interrupted {
                log::warn!(
                    "{name}: interrupted after {}/{} items, progress saved",
                    report.attempted,
                    report.selected
                );
                break;
            }
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }
}

/// File name for logs and tables
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
