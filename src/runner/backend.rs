// src/runner/backend.rs

//! Pluggable executor abstraction.
//!
//! The runner talks to a [`TaskExecutor`] instead of spawning processes
//! itself. This keeps process plumbing out of the event loop and lets
//! tests substitute an executor that completes tasks without running
//! anything.
//!
//! - [`ProcessExecutor`] is the production implementation: it runs each
//!   task's rendered command in a shell and reports the exit status back
//!   over the runner's event channel.
//! - A task without a command completes successfully on the spot; specs
//!   that exist purely to group dependencies are legal.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::ident::TaskName;
use crate::runner::{RunnerEvent, TaskOutcome};
use crate::track::Task;

/// Trait abstracting how dispatched tasks are executed.
///
/// Implementations must eventually emit a `TaskCompleted` event for every
/// task they accept, or the runner will wait forever.
pub trait TaskExecutor: Send {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<Task>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production executor: one shell process per task command.
pub struct ProcessExecutor {
    runtime_tx: mpsc::Sender<RunnerEvent>,
}

impl ProcessExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RunnerEvent>) -> Self {
        Self { runtime_tx }
    }
}

impl TaskExecutor for ProcessExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<Task>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            for task in tasks {
                match task.command() {
                    Ok(Some(cmd)) => {
                        tokio::spawn(run_command(task.name.clone(), cmd, tx.clone()));
                    }
                    Ok(None) => {
                        debug!(task = %task.name, "no command; completing immediately");
                        let _ = tx
                            .send(RunnerEvent::TaskCompleted {
                                task: task.name.clone(),
                                outcome: TaskOutcome::Success,
                            })
                            .await;
                    }
                    Err(err) => {
                        error!(task = %task.name, error = %err, "command failed to render");
                        let _ = tx
                            .send(RunnerEvent::TaskCompleted {
                                task: task.name.clone(),
                                outcome: TaskOutcome::Failed(-1),
                            })
                            .await;
                    }
                }
            }
            Ok(())
        })
    }
}

/// Run a single task command to completion and emit the outcome.
///
/// Errors around spawning or waiting are reported as a failed task rather
/// than bubbling up; the runner only ever learns outcomes.
async fn run_command(name: TaskName, cmd: String, runtime_tx: mpsc::Sender<RunnerEvent>) {
    let outcome = match run_command_inner(&name, &cmd).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(task = %name, error = %err, "task execution error");
            TaskOutcome::Failed(-1)
        }
    };
    let _ = runtime_tx
        .send(RunnerEvent::TaskCompleted {
            task: name,
            outcome,
        })
        .await;
}

async fn run_command_inner(name: &TaskName, cmd: &str) -> anyhow::Result<TaskOutcome> {
    info!(task = %name, %cmd, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for task '{name}'"))?;

    // Consume both pipes so buffers don't fill; log at debug.
    if let Some(stdout) = child.stdout.take() {
        let task_name = name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let task_name = name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{name}'"))?;

    let code = status.code().unwrap_or(-1);
    info!(
        task = %name,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    if status.success() {
        Ok(TaskOutcome::Success)
    } else {
        Ok(TaskOutcome::Failed(code))
    }
}
