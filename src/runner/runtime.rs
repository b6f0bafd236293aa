// src/runner/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::runner::backend::TaskExecutor;
use crate::runner::{RunnerEvent, RunnerOptions, TaskOutcome};
use crate::track::{Scheduler, TaskStatus};

/// Drives the scheduler in response to `RunnerEvent`s, and delegates
/// actual command execution to a [`TaskExecutor`].
///
/// This is a pure IO shell: all scheduling semantics live in
/// [`Scheduler`]. The loop alternates between draining the scheduler of
/// runnable tasks and waiting for an outcome to feed back in, and exits
/// once nothing is running and nothing further can be dispatched.
pub struct Runner<E: TaskExecutor> {
    scheduler: Scheduler,
    event_rx: mpsc::Receiver<RunnerEvent>,
    executor: E,
    options: RunnerOptions,
}

impl<E: TaskExecutor> fmt::Debug for Runner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: TaskExecutor> Runner<E> {
    pub fn new(
        scheduler: Scheduler,
        event_rx: mpsc::Receiver<RunnerEvent>,
        executor: E,
        options: RunnerOptions,
    ) -> Self {
        Self {
            scheduler,
            event_rx,
            executor,
            options,
        }
    }

    /// Main event loop. Returns the scheduler so callers can inspect the
    /// trace and final statuses.
    pub async fn run(mut self) -> Result<Scheduler> {
        info!("runner started");
        let mut in_flight: usize = 0;

        loop {
            let mut batch = Vec::new();
            while let Some(task) = self.scheduler.next_for()? {
                batch.push(task);
            }

            if !batch.is_empty() {
                in_flight += batch.len();
                let names: Vec<String> = batch.iter().map(|t| t.name.to_string()).collect();
                debug!(?names, in_flight, "spawning ready tasks");
                self.executor.spawn_ready_tasks(batch).await?;
            } else if in_flight == 0 {
                if self.scheduler.is_idle() {
                    info!("nothing left to do; runner exiting");
                    break;
                }
                // Entries are deferred but nothing is running: keep
                // stepping the scheduler so they decay and resolve.
                continue;
            }

            let event = match self.event_rx.recv().await {
                Some(event) => event,
                None => {
                    info!("runner event channel closed; exiting");
                    break;
                }
            };
            debug!(?event, "runner received event");

            match event {
                RunnerEvent::TaskCompleted { task, outcome } => {
                    in_flight = in_flight.saturating_sub(1);
                    let status = match outcome {
                        TaskOutcome::Success => TaskStatus::Success,
                        TaskOutcome::Failed(code) => {
                            warn!(%task, exit_code = code, "task failed");
                            TaskStatus::Failed
                        }
                    };
                    if !self.scheduler.set_status(&task, status) {
                        warn!(%task, "completion for unknown task; ignoring");
                    }
                    if self.options.rebuild_after_completion {
                        self.scheduler.build_network()?;
                    }
                }
                RunnerEvent::ShutdownRequested => {
                    info!("shutdown requested; stopping runner");
                    break;
                }
            }
        }

        info!("runner exiting");
        Ok(self.scheduler)
    }
}
