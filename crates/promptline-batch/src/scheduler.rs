//! Input discovery, completeness planning, and the worker pool
//!
//! Incomplete files are split into contiguous chunks, one per worker. Each
//! worker owns its chunk outright (no stealing), so every result file has
//! exactly one writer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use promptline_core::{ProgressContext, enter_worker, shutdown_flag, worker_label};
use promptline_store::{
    AnswerTable, RecordStore, Response, cleanup_tmp_files, load_work_items,
};

use crate::client::{ChatBackend, CompletionClient};
use crate::config::Config;
use crate::processor::{FileProcessor, file_label};
use crate::stats::{FileReport, RunSummary};

/// Counts for one input file against its result file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTally {
    /// Distinct identity keys in the input
    pub items: usize,
    pub done: usize,
    pub failed: usize,
    pub too_short: usize,
    pub skipped: usize,
    /// No record yet, or only a placeholder
    pub missing: usize,
    /// Keys a run would send to the API
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Ready(FileTally),
    /// Input or existing result file could not be read
    Unreadable(String),
}

/// One input file and what a run would do with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlan {
    pub name: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: FileStatus,
}

impl FilePlan {
    pub fn needs_work(&self) -> bool {
        matches!(&self.status, FileStatus::Ready(t) if t.remaining > 0)
    }

    pub fn is_complete(&self) -> bool {
        matches!(&self.status, FileStatus::Ready(t) if t.remaining == 0)
    }
}

/// Input files in `dir` ending with `suffix`, sorted by path.
pub fn discover_inputs(dir: &Path, suffix: &str) -> anyhow::Result<Vec<PathBuf>> {
    anyhow::ensure!(
        dir.is_dir(),
        "Input directory does not exist: {}",
        dir.display()
    );
    let pattern = format!(
        "{}/*{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(suffix)
    );
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Invalid input pattern: {pattern}"))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Result path for `input`: its file name with the trailing `input_suffix`
/// replaced by `output_suffix`, placed in `output_dir`.
pub fn output_path_for(
    input: &Path,
    output_dir: &Path,
    input_suffix: &str,
    output_suffix: &str,
) -> Option<PathBuf> {
    let name = input.file_name()?.to_str()?;
    let stem = name.strip_suffix(input_suffix)?;
    Some(output_dir.join(format!("{stem}{output_suffix}")))
}

/// Compare one input file against its result file without any API call.
pub fn inspect_file(input: &Path, output: &Path, max_fail_count: u32) -> FilePlan {
    let mut plan = FilePlan {
        name: file_label(input),
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        status: FileStatus::Unreadable(String::new()),
    };

    let items = match load_work_items(input) {
        Ok(items) => items,
        Err(e) => {
            plan.status = FileStatus::Unreadable(format!("input: {e}"));
            return plan;
        }
    };
    let store = match RecordStore::load(output) {
        Ok(store) => store,
        Err(e) => {
            plan.status = FileStatus::Unreadable(format!("results: {e}"));
            return plan;
        }
    };

    let mut tally = FileTally::default();
    let mut seen = HashSet::new();
    for item in &items {
        let key = item.key();
        if !seen.insert(key.clone()) {
            continue;
        }
        tally.items += 1;
        match store.get(&key).map(|r| &r.response) {
            None | Some(Response::Pending) => tally.missing += 1,
            Some(Response::Success { .. }) => tally.done += 1,
            Some(Response::RequestFailed { .. }) => tally.failed += 1,
            Some(Response::TooShort { .. }) => tally.too_short += 1,
            Some(Response::Skipped { .. }) => tally.skipped += 1,
        }
    }
    tally.remaining = store.select(&items, max_fail_count).len();
    plan.status = FileStatus::Ready(tally);
    plan
}

/// Plan every input file `config` points at, without a backend.
pub fn plan_files(config: &Config) -> anyhow::Result<Vec<FilePlan>> {
    let c = config;
    let inputs = discover_inputs(&c.input_dir, &c.input_suffix)?;
    Ok(inputs
        .iter()
        .map(|input| {
            match output_path_for(input, &c.output_dir, &c.input_suffix, &c.output_suffix) {
                Some(output) => inspect_file(input, &output, c.max_fail_count),
                None => FilePlan {
                    name: file_label(input),
                    input: input.clone(),
                    output: PathBuf::new(),
                    status: FileStatus::Unreadable("file name is not valid UTF-8".into()),
                },
            }
        })
        .collect())
}

/// Split `items` into at most `workers` contiguous chunks of
/// `ceil(n / workers)`. Empty chunks are not returned.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let size = items.len().div_ceil(workers.max(1));
    let mut chunks = Vec::with_capacity(workers);
    let mut rest = items.into_iter().peekable();
    while rest.peek().is_some() {
        chunks.push(rest.by_ref().take(size).collect());
    }
    chunks
}

/// Workers [`partition`] would start for `jobs` files.
pub fn workers_needed(jobs: usize, workers: usize) -> usize {
    if jobs == 0 {
        return 0;
    }
    jobs.div_ceil(jobs.div_ceil(workers.max(1)))
}

/// Runs every incomplete input file through a fixed pool of workers.
pub struct WorkScheduler {
    config: Config,
    backend: Arc<dyn ChatBackend>,
    shutdown: &'static AtomicBool,
}

impl WorkScheduler {
    pub fn new(config: Config, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            config,
            backend,
            shutdown: shutdown_flag(),
        }
    }

    /// Use `flag` instead of the process-wide shutdown flag.
    pub fn with_shutdown_flag(mut self, flag: &'static AtomicBool) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Plan every discovered input file. No API calls.
    pub fn inspect(&self) -> anyhow::Result<Vec<FilePlan>> {
        plan_files(&self.config)
    }

    /// Process every incomplete file and join all workers.
    ///
    /// File-level failures are collected in the summary; only problems that
    /// stop the whole run (no answer table, no output dir) are errors.
    pub fn run(&self, progress: &ProgressContext) -> anyhow::Result<RunSummary> {
        let started = Instant::now();
        let c = &self.config;
        c.validate(true)?;

        std::fs::create_dir_all(&c.output_dir).with_context(|| {
            format!("Cannot create output directory {}", c.output_dir.display())
        })?;
        let swept = cleanup_tmp_files(&c.output_dir, &c.output_suffix)
            .context("Cannot clean up stale tmp files")?;
        if swept > 0 {
            log::info!("Removed {swept} stale tmp files from an earlier run");
        }
        let answers = AnswerTable::load(&c.answer_path).context("Cannot load answer table")?;
        log::debug!("Loaded {} true answers", answers.len());

        let plans = self.inspect()?;
        let mut summary = RunSummary {
            files_total: plans.len(),
            ..Default::default()
        };

        let mut pending = Vec::new();
        for plan in plans {
            match &plan.status {
                FileStatus::Unreadable(e) => {
                    log::error!("{}: {e}", plan.name);
                    summary.add_failure(&plan.name, e);
                }
                FileStatus::Ready(_) if plan.needs_work() => pending.push(plan),
                FileStatus::Ready(_) => summary.files_complete += 1,
            }
        }

        let chunks = partition(pending, c.workers);
        summary.workers = chunks.len();
        if chunks.is_empty() {
            log::info!("All {} files already complete", summary.files_complete);
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        log::info!(
            "Processing {} files with {} workers ({}, model={})",
            chunks.iter().map(Vec::len).sum::<usize>(),
            chunks.len(),
            c.policy,
            c.client.model
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(chunks.len())
            .thread_name(|i| format!("promptline-pool-{}", i + 1))
            .build()
            .context("Failed to create worker pool")?;

        let reports: Mutex<Vec<FileReport>> = Mutex::new(Vec::new());
        let failures: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());
        let is_tty = progress.is_tty();

        pool.scope(|s| {
            for (idx, chunk) in chunks.into_iter().enumerate() {
                let client = CompletionClient::new(
                    Arc::clone(&self.backend),
                    c.api_keys[idx].clone(),
                    c.client.clone(),
                );
                let (answers, reports, failures) = (&answers, &reports, &failures);
                s.spawn(move |_| {
                    let worker = idx + 1;
                    let _tag = enter_worker(worker);
                    let processor = FileProcessor::new(
                        &client,
                        answers,
                        c.policy,
                        c.max_fail_count,
                        c.batch_size,
                        self.shutdown,
                    );
                    let pb = progress.worker_bar(&worker_label(worker));
                    log::debug!("Assigned {} files", chunk.len());

                    for plan in chunk {
                        if self.shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        match processor.process(&plan.input, &plan.output, &pb) {
                            Ok(report) => {
                                if !is_tty {
                                    report.log();
                                }
                                reports.lock().expect("worker thread panicked").push(report);
                            }
                            Err(e) => {
                                log::error!("{}: {e}", plan.name);
                                failures
                                    .lock()
                                    .expect("worker thread panicked")
                                    .push((plan.name.clone(), e.to_string()));
                            }
                        }
                    }
                    pb.finish_and_clear();
                });
            }
        });

        for report in reports.into_inner().unwrap_or_default() {
            summary.add_report(&report);
        }
        for (file, error) in failures.into_inner().unwrap_or_default() {
            summary.add_failure(&file, error);
        }
        summary.interrupted |= self.shutdown.load(Ordering::Relaxed);
        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_replaces_trailing_suffix_only() {
        let out = output_path_for(
            Path::new("in/a_changed.json_changed.json"),
            Path::new("out"),
            "_changed.json",
            "_r1.json",
        );
        assert_eq!(out, Some(PathBuf::from("out/a_changed.json_r1.json")));
    }

    #[test]
    fn output_name_requires_suffix() {
        assert_eq!(
            output_path_for(Path::new("in/notes.txt"), Path::new("out"), "_changed.json", "_r.json"),
            None
        );
    }

    #[test]
    fn partition_covers_everything_once() {
        for n in [0usize, 1, 3, 5, 7, 10, 23] {
            for workers in 1..=8 {
                let chunks = partition((0..n).collect(), workers);
                assert!(chunks.len() <= workers);
                assert!(chunks.iter().all(|c| !c.is_empty()));
                let flat: Vec<usize> = chunks.concat();
                assert_eq!(flat, (0..n).collect::<Vec<_>>(), "n={n} workers={workers}");
            }
        }
    }

    #[test]
    fn workers_needed_matches_partition() {
        for jobs in 0usize..=30 {
            for workers in 1..=8 {
                let chunks = partition((0..jobs).collect::<Vec<_>>(), workers);
                assert_eq!(workers_needed(jobs, workers), chunks.len(), "{jobs}/{workers}");
            }
        }
        assert_eq!(workers_needed(5, 4), 3);
    }

    #[test]
    fn partition_uses_ceil_chunks() {
        let chunks = partition((0..7).collect::<Vec<_>>(), 3);
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);

        // 5 files, 4 workers: chunks of 2, so only 3 workers start
        let chunks = partition((0..5).collect::<Vec<_>>(), 4);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_changed.json", "a_changed.json", "c_result.json", "d.txt"] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        std::fs::create_dir(dir.path().join("e_changed.json")).unwrap();
        let found = discover_inputs(dir.path(), "_changed.json").unwrap();
        let names: Vec<String> = found.iter().map(|p| file_label(p)).collect();
        assert_eq!(names, vec!["a_changed.json", "b_changed.json"]);
    }

    #[test]
    fn discover_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_inputs(&dir.path().join("nope"), "_changed.json").is_err());
    }

    #[test]
    fn inspect_counts_states() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("x_changed.json");
        let output = dir.path().join("x_result.json");
        std::fs::write(
            &input,
            r#"[
                {"ID":"1","changed_label":"age","label_value":"30","prompt":"p"},
                {"ID":"1","changed_label":"age","label_value":"60","prompt":"p"},
                {"ID":"2","changed_label":"age","label_value":"30","prompt":"p"},
                {"ID":"3","changed_label":"age","label_value":"30","prompt":"p"}
            ]"#,
        )
        .unwrap();
        std::fs::write(
            &output,
            r#"[
                {"ID":"1","changed_label":"age","label_value":"30","response":["A",0],"true_answer":null,"fail_count":0},
                {"ID":"2","changed_label":"age","label_value":"30","response":["API Request failed",0],"true_answer":null,"fail_count":1}
            ]"#,
        )
        .unwrap();

        let plan = inspect_file(&input, &output, 3);
        let FileStatus::Ready(t) = plan.status else {
            panic!("expected ready plan");
        };
        assert_eq!(t.items, 4);
        assert_eq!(t.done, 1);
        assert_eq!(t.failed, 1);
        assert_eq!(t.missing, 2);
        assert_eq!(t.remaining, 3);
    }

    #[test]
    fn inspect_absent_output_means_everything_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("x_changed.json");
        std::fs::write(
            &input,
            r#"[{"ID":"1","changed_label":"age","label_value":"30","prompt":"p"}]"#,
        )
        .unwrap();
        let plan = inspect_file(&input, &dir.path().join("x_result.json"), 3);
        assert!(plan.needs_work());
    }

    #[test]
    fn inspect_corrupt_output_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("x_changed.json");
        let output = dir.path().join("x_result.json");
        std::fs::write(&input, "[]").unwrap();
        std::fs::write(&output, "garbage").unwrap();
        let plan = inspect_file(&input, &output, 3);
        assert!(matches!(plan.status, FileStatus::Unreadable(ref e) if e.starts_with("results:")));
        assert!(!plan.needs_work());
        assert!(!plan.is_complete());
    }
}
