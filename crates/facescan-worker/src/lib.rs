//! facescan-worker — one face-search task per process.
//!
//! Encodes a reference photo, scans a directory of `.jpg` candidates, keeps a
//! per-task audit log and reports progress to the task server over HTTP.

pub mod audit;
pub mod config;
pub mod engine;
pub mod reporter;
pub mod runner;
pub mod task;

pub use config::Config;
pub use runner::{BatchRunner, RunError, ScanSummary};
pub use task::Task;
