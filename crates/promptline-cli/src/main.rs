//! promptline - resumable batch prompting against chat completion APIs
//!
//! Sends every prompt of a directory of perturbed datasets to a model,
//! saving answers per file so interrupted runs pick up where they stopped.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::{Config, mask_key};

#[derive(Parser)]
#[command(name = "promptline")]
#[command(about = "Resumable batch prompting against chat completion APIs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./promptline.toml or ~/.config/promptline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Process every incomplete dataset file
    Run(cmd::run::RunArgs),
    /// Show per-file progress without calling the API
    Status,
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(promptline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug: progress bars show activity
    //   non-TTY: info unless --debug: logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    promptline_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, &progress),
        Command::Status => cmd::status::run(&config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            print_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let p = &config.paths;
    table.add_row(vec!["Input", &format!("{}/*{}", p.input_dir.display(), p.input_suffix)]);
    table.add_row(vec!["Output", &format!("{}/*{}", p.output_dir.display(), p.output_suffix)]);
    table.add_row(vec!["Answer table", &p.answer_path.display().to_string()]);

    let a = &config.api;
    table.add_row(vec!["Base URL", &a.base_url]);
    table.add_row(vec![
        "Model",
        if a.model.is_empty() { "not set" } else { a.model.as_str() },
    ]);
    let provider = a
        .provider
        .as_ref()
        .map_or_else(|| "default".to_string(), |v| v.to_string());
    table.add_row(vec!["Provider", &provider]);
    table.add_row(vec!["Temperature", &a.temperature.to_string()]);
    table.add_row(vec!["Token limit", &format!("{} = {}", a.token_limit_field, a.max_tokens)]);
    let keys = if a.keys.is_empty() {
        "not set".to_string()
    } else {
        a.keys.iter().map(|k| mask_key(k)).collect::<Vec<_>>().join(", ")
    };
    table.add_row(vec!["API keys", &keys]);
    table.add_row(vec![
        "Timeouts",
        &format!(
            "{}s request, {}s connect",
            a.request_timeout_secs, a.connect_timeout_secs
        ),
    ]);
    table.add_row(vec!["Request interval", &format!("{}ms", a.request_interval_ms)]);

    let r = &config.retry;
    table.add_row(vec!["Policy", &r.policy.to_string()]);
    table.add_row(vec!["Max retries", &r.max_retries.to_string()]);
    table.add_row(vec!["Max fail count", &r.max_fail_count.to_string()]);
    table.add_row(vec![
        "Retry delay",
        &format!("{}ms base, {}s max", r.base_delay_ms, r.max_delay_secs),
    ]);

    table.add_row(vec![
        "Workers",
        &format!(
            "{} (batch size {})",
            config.workers.count, config.workers.batch_size
        ),
    ]);

    let d = &config.degrade;
    table.add_row(vec![
        "Degrade region",
        &format!("{} ... {}", d.start_marker, d.end_marker),
    ]);
    table.add_row(vec!["Shrink step", &format!("{} chars", d.shrink_chars)]);

    eprintln!("\n{table}");
}
