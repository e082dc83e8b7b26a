//! `promptline status` - per-file progress without any API call

use anyhow::Result;

use promptline_batch::{FileStatus, plan_files, stats::plan_table};

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let batch = config.to_batch();
    batch.validate(false)?;

    let plans = plan_files(&batch)?;
    if plans.is_empty() {
        eprintln!(
            "No *{} files in {}",
            batch.input_suffix,
            batch.input_dir.display()
        );
        return Ok(());
    }

    println!("{}", plan_table(&plans));

    let complete = plans.iter().filter(|p| p.is_complete()).count();
    let unreadable = plans
        .iter()
        .filter(|p| matches!(p.status, FileStatus::Unreadable(_)))
        .count();
    eprintln!(
        "{complete}/{} files complete, {unreadable} unreadable",
        plans.len()
    );
    Ok(())
}
