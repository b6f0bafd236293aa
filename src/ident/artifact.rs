// src/ident/artifact.rs

//! File-system-path-like targets connecting producer and consumer tasks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use globset::Glob;

use crate::errors::TrackingError;

/// Prefix distinguishing artifact strings from task names in configuration.
pub const ARTIFACT_PREFIX: &str = "file:";

/// A file-like target, either concrete (exact path) or abstract (glob
/// pattern). Artifacts are never owned by a single task; any number of
/// producers and consumers may reference the same artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskArtifact {
    path: PathBuf,
}

impl TaskArtifact {
    /// Build an artifact from a path. Abstract paths (containing glob
    /// metacharacters) must compile as a valid glob.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, TrackingError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(TrackingError::ConfigError(
                "artifact path is empty".to_string(),
            ));
        }
        let artifact = Self { path };
        if !artifact.is_concrete() {
            Glob::new(&artifact.path.to_string_lossy()).map_err(|e| {
                TrackingError::ConfigError(format!(
                    "artifact pattern '{}' is not a valid glob: {e}",
                    artifact.path.display()
                ))
            })?;
        }
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Concrete artifacts name an exact path; abstract ones carry glob
    /// metacharacters.
    pub fn is_concrete(&self) -> bool {
        let s = self.path.to_string_lossy();
        !s.contains(['*', '?', '['])
    }

    /// Whether this (abstract) artifact pattern covers the given concrete
    /// artifact. A concrete artifact only matches itself.
    pub fn matches(&self, concrete: &TaskArtifact) -> bool {
        if self.is_concrete() {
            return self == concrete;
        }
        Glob::new(&self.path.to_string_lossy())
            .map(|glob| glob.compile_matcher().is_match(&concrete.path))
            .unwrap_or(false)
    }
}

impl fmt::Display for TaskArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ARTIFACT_PREFIX}{}", self.path.display())
    }
}

impl FromStr for TaskArtifact {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(ARTIFACT_PREFIX).unwrap_or(s);
        TaskArtifact::new(raw)
    }
}
