use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use taskdag::errors::Result;
use taskdag::runner::{RunnerEvent, TaskExecutor, TaskOutcome};
use taskdag::track::Task;

/// A fake executor that:
/// - records which tasks were "run" (by their de-uniq'd name)
/// - immediately reports TaskCompleted for each dispatched task.
///
/// Outcomes default to `Success`; specs listed via [`FakeExecutor::failing_on`]
/// report `Failed(1)` instead.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RunnerEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    fail: Vec<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RunnerEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            fail: Vec::new(),
        }
    }

    /// Report `Failed(1)` for every instance of the named spec.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.fail.push(name.to_string());
        self
    }
}

impl TaskExecutor for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<Task>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let fail = self.fail.clone();

        Box::pin(async move {
            for task in tasks {
                let plain = task.name.de_uniq().to_string();
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(plain.clone());
                }

                let outcome = if fail.iter().any(|f| *f == plain) {
                    TaskOutcome::Failed(1)
                } else {
                    TaskOutcome::Success
                };

                tx.send(RunnerEvent::TaskCompleted {
                    task: task.name.clone(),
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
