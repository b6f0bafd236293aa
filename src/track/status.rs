// src/track/status.rs

use std::fmt;

/// Lifecycle of a task, from bare name to terminal state.
///
/// ```text
/// Named -> Init -> Wait -> Running -> Success
///                                  \-> Failed -> Dead (descendants)
///                                  \-> Halted (cleanup still runs)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskStatus {
    /// Known only by name; no spec registered.
    Named,
    /// Spec registered, not yet considered by the scheduler.
    Init,
    /// Queued behind unfinished dependencies.
    Wait,
    /// Dispatched to an executor.
    Running,
    Success,
    Failed,
    /// Gave up without failing outright; the cleanup variant still runs.
    Halted,
    /// Abandoned because an ancestor failed; cleanup is skipped.
    Dead,
}

impl TaskStatus {
    /// Whether the task will never run (again).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Halted | TaskStatus::Dead
        )
    }

    /// Whether dependents of this task are free to run.
    pub fn satisfies_dependents(self) -> bool {
        self == TaskStatus::Success
    }

    /// Whether dependents of this task must be abandoned.
    pub fn poisons_dependents(self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Dead)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Named => "named",
            TaskStatus::Init => "init",
            TaskStatus::Wait => "wait",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Halted => "halted",
            TaskStatus::Dead => "dead",
        };
        f.write_str(label)
    }
}

/// Lifecycle of a file artifact node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ArtifactStatus {
    /// Mentioned by a relation; nothing known about it on disk.
    #[default]
    Declared,
    /// Producers have not all finished.
    Stale,
    /// All producers finished; consumers may proceed.
    Exists,
}

impl ArtifactStatus {
    pub fn is_satisfied(self) -> bool {
        self == ArtifactStatus::Exists
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArtifactStatus::Declared => "declared",
            ArtifactStatus::Stale => "stale",
            ArtifactStatus::Exists => "exists",
        };
        f.write_str(label)
    }
}
