//! `promptline run` - send every pending prompt and save the results

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use promptline_batch::scheduler::workers_needed;
use promptline_batch::{OpenRouterBackend, Policy, WorkScheduler, plan_files, stats::plan_table};
use promptline_core::{SharedProgress, install_signal_handlers};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of parallel workers (one API key each)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// What to do with malformed answers: retry or degrade
    #[arg(long)]
    pub policy: Option<Policy>,

    /// Items per saved batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Show which files would be processed without calling the API
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let mut batch = config.to_batch();
    if let Some(workers) = args.workers {
        batch.workers = workers;
    }
    if let Some(policy) = args.policy {
        batch.policy = policy;
    }
    if let Some(batch_size) = args.batch_size {
        batch.batch_size = batch_size;
    }
    batch.validate(!args.dry_run)?;

    if args.dry_run {
        let plans = plan_files(&batch)?;
        let pending = plans.iter().filter(|p| p.needs_work()).count();
        println!("{}", plan_table(&plans));
        eprintln!(
            "{pending} of {} files need work; {} workers would start",
            plans.len(),
            workers_needed(pending, batch.workers)
        );
        return Ok(ExitCode::SUCCESS);
    }

    install_signal_handlers().context("Failed to install signal handlers")?;

    let backend = OpenRouterBackend::new(&batch.base_url, &batch.http)
        .context("Failed to create HTTP client")?;
    log::info!(
        "promptline starting: model={}, policy={}, workers={}, batch={}",
        batch.client.model,
        batch.policy,
        batch.workers,
        batch.batch_size
    );

    let scheduler = WorkScheduler::new(batch, Arc::new(backend));
    let summary = scheduler.run(progress)?;

    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }

    if summary.interrupted {
        log::warn!("Shutdown requested, progress saved");
        return Ok(ExitCode::from(130));
    }
    if summary.has_failures() {
        log::error!("{} files failed", summary.files_failed);
        return Ok(ExitCode::from(1));
    }

    log::info!("promptline completed successfully");
    Ok(ExitCode::SUCCESS)
}
