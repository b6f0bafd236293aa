// src/runner/mod.rs

//! Async shell around the tracker.
//!
//! The scheduler in [`crate::track`] is synchronous and pure; this module
//! wraps it in an event loop that:
//! - drains the scheduler of runnable tasks and hands them to an executor
//! - feeds completion outcomes back into the scheduler
//! - rebuilds the network after completions, so specs a job body queued
//!   get discovered
//!
//! Execution is pluggable through [`TaskExecutor`]; production code uses
//! [`ProcessExecutor`], tests can substitute their own.

use crate::ident::TaskName;

/// Outcome of a task process for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(i32),
}

/// Events flowing into the runner from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// A task process exited with a concrete outcome.
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Runner behaviour knobs.
#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Rebuild the network after every completion, picking up specs the
    /// finished task registered. Jobs depend on this; only disable it for
    /// static graphs.
    pub rebuild_after_completion: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions {
            rebuild_after_completion: true,
        }
    }
}

pub mod backend;
pub mod runtime;

pub use backend::{ProcessExecutor, TaskExecutor};
pub use runtime::Runner;
