// src/ident/mod.rs

//! Identifier model: immutable, comparable task and artifact identifiers.
//!
//! - [`task_name`] holds [`TaskName`], the hierarchical task identifier with
//!   its uniq/head/cleanup markers.
//! - [`artifact`] holds [`TaskArtifact`], a file-system-path-like target that
//!   connects producer and consumer tasks without a direct name reference.

pub mod artifact;
pub mod task_name;

pub use artifact::{TaskArtifact, ARTIFACT_PREFIX};
pub use task_name::TaskName;

use std::fmt;
use std::str::FromStr;

use crate::errors::TrackingError;

/// Either kind of identifier that can appear in a relation target, a queue
/// entry, or a network node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ident {
    Task(TaskName),
    Artifact(TaskArtifact),
}

impl Ident {
    /// Whether this identifies a single runnable/producible thing: a uniq'd
    /// task name or a glob-free artifact path.
    pub fn is_concrete(&self) -> bool {
        match self {
            Ident::Task(name) => name.is_concrete(),
            Ident::Artifact(artifact) => artifact.is_concrete(),
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Task(name) => write!(f, "{name}"),
            Ident::Artifact(artifact) => write!(f, "{artifact}"),
        }
    }
}

impl From<TaskName> for Ident {
    fn from(name: TaskName) -> Self {
        Ident::Task(name)
    }
}

impl From<TaskArtifact> for Ident {
    fn from(artifact: TaskArtifact) -> Self {
        Ident::Artifact(artifact)
    }
}

impl FromStr for Ident {
    type Err = TrackingError;

    /// Strings with the `file:` prefix parse as artifacts, everything else
    /// as a task name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(ARTIFACT_PREFIX) {
            TaskArtifact::from_str(s).map(Ident::Artifact)
        } else {
            TaskName::from_str(s).map(Ident::Task)
        }
    }
}
