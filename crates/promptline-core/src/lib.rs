//! Promptline Core - Common infrastructure for batch prompt runs
//!
//! This crate provides the pieces every stage of a run shares: logging that
//! cooperates with progress bars, graceful shutdown, retry delays, and a
//! blocking JSON-over-HTTP client.

pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use http::{HttpConfig, HttpError, JsonClient};
pub use logging::{
    IndicatifLogger, WorkerGuard, current_worker, enter_worker, init_logging, worker_label,
};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::RetryPolicy;
pub use shutdown::{install_signal_handlers, shutdown_flag};
