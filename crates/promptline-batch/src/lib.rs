//! Promptline Batch - resumable prompt runs over a directory of datasets
//!
//! Flow: `WorkScheduler` plans every `*_changed.json` input, splits the
//! incomplete ones across workers, and each worker drives a `FileProcessor`
//! that sends prompts through a `CompletionClient` and persists outcomes
//! batch by batch.

pub mod client;
pub mod config;
pub mod openrouter;
pub mod processor;
pub mod region;
pub mod scheduler;
pub mod stats;

pub use client::{
    ApiError, ChatBackend, ChatRequest, ClientSettings, CompletionClient, Message, Outcome, Policy,
};
pub use config::Config;
pub use openrouter::OpenRouterBackend;
pub use processor::{FileProcessor, ProcessError};
pub use region::{RegionMarkers, Shrink};
pub use scheduler::{FilePlan, FileStatus, FileTally, WorkScheduler, plan_files};
pub use stats::{FileReport, RunSummary};
