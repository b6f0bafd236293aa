// src/track/task.rs

use std::collections::BTreeMap;

use crate::errors::Result;
use crate::ident::TaskName;
use crate::spec::{render_template, TaskSpec, Value};
use crate::track::status::TaskStatus;

pub use crate::spec::CMD_KEY;

/// State key a job body receives naming its concrete head instance, so
/// subtasks it registers can declare `required_for` the head.
pub const JOB_HEAD_KEY: &str = "job_head";

/// A dispatched instance of a concrete spec.
///
/// Created lazily, only when the scheduler has decided the instance is
/// runnable. `state` starts as a copy of the spec's parameters; cleanup
/// instances additionally inherit their parent's final state.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: TaskName,
    pub spec: TaskSpec,
    pub status: TaskStatus,
    pub state: BTreeMap<String, Value>,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Task {
            name: spec.name.clone(),
            state: spec.extra.clone(),
            spec,
            status: TaskStatus::Init,
        }
    }

    /// The shell command for this task, with `{key}` placeholders rendered
    /// from the task state. `None` when the spec declares no command.
    pub fn command(&self) -> Result<Option<String>> {
        match self.state.get(CMD_KEY).and_then(Value::as_str) {
            Some(template) => render_template(template, &self.state).map(Some),
            None => Ok(None),
        }
    }
}
