// src/ident/task_name.rs

//! Hierarchical task names.
//!
//! A name is an ordered sequence of plain segments (`group::name`) plus
//! optional markers rendered as `$...$` segments:
//!
//! - a uniq id (`build::app::$1f3a...$`) marking a concrete instance,
//! - `$head$` for the follow-up task of a job,
//! - `$cleanup$` for the derived cleanup variant.
//!
//! Names are immutable; every transformation returns a new value.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::errors::TrackingError;

const SEPARATOR: &str = "::";
const HEAD_MARK: &str = "$head$";
const CLEANUP_MARK: &str = "$cleanup$";

/// Immutable hierarchical task identifier.
///
/// The derived total order (segments, then marks, then uniq id) is only used
/// for sorted containers and stable output. Scheduling order comes from the
/// queue's priorities; provenance questions go through [`TaskName::derives_from`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskName {
    segments: Vec<String>,
    head: bool,
    cleanup: bool,
    uniq: Option<Uuid>,
}

impl TaskName {
    /// Build a plain (unmarked, abstract) name from segments.
    pub fn new(segments: Vec<String>) -> Result<Self, TrackingError> {
        if segments.is_empty() {
            return Err(TrackingError::ConfigError(
                "task name needs at least one segment".to_string(),
            ));
        }
        for seg in &segments {
            if seg.is_empty() {
                return Err(TrackingError::ConfigError(
                    "task name contains an empty segment".to_string(),
                ));
            }
            if seg.contains('$') {
                return Err(TrackingError::ConfigError(format!(
                    "task name segment '{seg}' uses the reserved '$' character"
                )));
            }
        }
        Ok(Self {
            segments,
            head: false,
            cleanup: false,
            uniq: None,
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Concrete names carry a uniq id and belong to exactly one instance.
    pub fn is_concrete(&self) -> bool {
        self.uniq.is_some()
    }

    pub fn is_head(&self) -> bool {
        self.head
    }

    pub fn is_cleanup(&self) -> bool {
        self.cleanup
    }

    pub fn uniq(&self) -> Option<Uuid> {
        self.uniq
    }

    /// Mint a concrete instance name with a fresh uniq id, keeping markers.
    pub fn with_uniq(&self) -> Self {
        Self {
            uniq: Some(Uuid::new_v4()),
            ..self.clone()
        }
    }

    /// Strip the uniq id, returning the abstract form of this name.
    pub fn de_uniq(&self) -> Self {
        Self {
            uniq: None,
            ..self.clone()
        }
    }

    /// The abstract head-marked companion of this name.
    pub fn with_head(&self) -> Self {
        Self {
            head: true,
            uniq: None,
            ..self.clone()
        }
    }

    /// The abstract cleanup-marked companion of this name.
    pub fn with_cleanup(&self) -> Self {
        Self {
            cleanup: true,
            uniq: None,
            ..self.clone()
        }
    }

    /// Segments only: no markers, no uniq id.
    pub fn base(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            head: false,
            cleanup: false,
            uniq: None,
        }
    }

    /// Provenance relation: was `self` produced from `other` by marking
    /// and/or instantiating it?
    ///
    /// Reflexive. Distinct from the `Ord` impl: `derives_from` answers
    /// "is this an instance/variant of that template", not "which sorts
    /// first".
    pub fn derives_from(&self, other: &TaskName) -> bool {
        if self.segments != other.segments {
            return false;
        }
        if other.head && !self.head {
            return false;
        }
        if other.cleanup && !self.cleanup {
            return false;
        }
        match other.uniq {
            None => true,
            Some(id) => self.uniq == Some(id),
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(SEPARATOR))?;
        if self.head {
            write!(f, "{SEPARATOR}{HEAD_MARK}")?;
        }
        if self.cleanup {
            write!(f, "{SEPARATOR}{CLEANUP_MARK}")?;
        }
        if let Some(id) = self.uniq {
            write!(f, "{SEPARATOR}${}$", id.simple())?;
        }
        Ok(())
    }
}

impl FromStr for TaskName {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut head = false;
        let mut cleanup = false;
        let mut uniq = None;

        for part in s.split(SEPARATOR) {
            match part {
                HEAD_MARK => head = true,
                CLEANUP_MARK => cleanup = true,
                marked if marked.starts_with('$') && marked.ends_with('$') && marked.len() > 2 => {
                    let inner = &marked[1..marked.len() - 1];
                    match Uuid::parse_str(inner) {
                        Ok(id) => uniq = Some(id),
                        Err(_) => {
                            return Err(TrackingError::ConfigError(format!(
                                "unknown marker '{marked}' in task name '{s}'"
                            )));
                        }
                    }
                }
                plain => {
                    if plain.is_empty() {
                        return Err(TrackingError::ConfigError(format!(
                            "task name '{s}' contains an empty segment"
                        )));
                    }
                    if plain.contains('$') {
                        return Err(TrackingError::ConfigError(format!(
                            "task name segment '{plain}' uses the reserved '$' character"
                        )));
                    }
                    segments.push(plain.to_string());
                }
            }
        }

        if segments.is_empty() {
            return Err(TrackingError::ConfigError(format!(
                "task name '{s}' has no plain segments"
            )));
        }

        Ok(Self {
            segments,
            head,
            cleanup,
            uniq,
        })
    }
}
