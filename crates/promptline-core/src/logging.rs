//! Logging with indicatif integration and per-worker tags
//!
//! A worker enters its id with [`enter_worker`]; every line logged on that
//! thread until the guard drops is tagged `wN`, the same label as its
//! progress bar and credential slot.

use std::cell::Cell;

use indicatif::MultiProgress;

thread_local! {
    static WORKER_ID: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Restores the previous worker id of the thread when dropped.
#[must_use = "the worker tag is cleared when the guard drops"]
pub struct WorkerGuard {
    previous: Option<usize>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        WORKER_ID.with(|id| id.set(self.previous));
    }
}

/// Tag log lines of the calling thread with worker `id` (1-based).
pub fn enter_worker(id: usize) -> WorkerGuard {
    let previous = WORKER_ID.with(|cell| cell.replace(Some(id)));
    WorkerGuard { previous }
}

/// Worker id of the calling thread, if it is running a worker.
pub fn current_worker() -> Option<usize> {
    WORKER_ID.with(Cell::get)
}

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Short label for a worker id (`3` → `w3`), shared with its progress bar.
pub fn worker_label(id: usize) -> String {
    format!("w{id}")
}

/// Render one log line body: optional worker tag, then the message.
fn render(args: &std::fmt::Arguments<'_>) -> String {
    match current_worker() {
        Some(id) => format!("{} | {args}", worker_label(id)),
        None => args.to_string(),
    }
}

/// Logger that prints through indicatif MultiProgress to avoid mixing with progress bars.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            let (pre, label, post) = level_style(record.level(), true);
            let line = format!("[{pre}{label}{post}] {}", render(record.args()));
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initialize logging with optional TTY mode (indicatif integration)
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let env = env_logger::Env::default().default_filter_or(default_level);

    if let Some(multi) = multi {
        let logger = env_logger::Builder::from_env(env).build();
        let max_level = logger.filter();

        if log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone()))).is_ok() {
            log::set_max_level(max_level);
        }
    } else {
        // Non-TTY: no ANSI colors, plain lines for log aggregation
        let _ = env_logger::Builder::from_env(env)
            .format(|buf, record| {
                let (_, label, _) = level_style(record.level(), false);
                writeln!(buf, "[{label}] {}", render(record.args()))
            })
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_label_format() {
        assert_eq!(worker_label(3), "w3");
        assert_eq!(worker_label(12), "w12");
    }

    #[test]
    fn untagged_outside_a_worker() {
        assert_eq!(current_worker(), None);
        assert_eq!(render(&format_args!("plain")), "plain");
    }

    #[test]
    fn tag_follows_worker_id_not_thread_name() {
        let handle = std::thread::Builder::new()
            .name("pool-1".into())
            .spawn(|| {
                let _guard = enter_worker(2);
                render(&format_args!("file done"))
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), "w2 | file done");
    }

    #[test]
    fn guard_restores_previous_worker() {
        let outer = enter_worker(1);
        {
            let _inner = enter_worker(4);
            assert_eq!(current_worker(), Some(4));
        }
        assert_eq!(current_worker(), Some(1));
        drop(outer);
        assert_eq!(current_worker(), None);
    }

    #[test]
    fn level_labels_are_padded() {
        let (_, label, _) = level_style(log::Level::Warn, false);
        assert_eq!(label.len(), 5);
        let (pre, _, post) = level_style(log::Level::Error, false);
        assert!(pre.is_empty() && post.is_empty());
    }
}
