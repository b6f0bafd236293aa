// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

/// Registry, network and scheduler invariant violations.
///
/// These surface immediately at the call that detects them; they describe
/// configuration or programming errors, not transient conditions, so nothing
/// here is retried. Execution failures of a dispatched task are *not* errors:
/// they come back through `Scheduler::set_status` and propagate through the
/// graph as `Dead`/`Halted` statuses instead.
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Spec '{spec}' names unregistered source '{source}'")]
    UnregisteredSource { spec: String, source: String },

    #[error("A different spec is already registered under '{0}'")]
    SpecConflict(String),

    #[error("Expected a concrete name, got '{0}'")]
    NotConcrete(String),

    #[error("Injection into '{target}' failed: {reason}")]
    InjectionFailed { target: String, reason: String },

    #[error("Template references missing key '{0}'")]
    TemplateKey(String),

    #[error("Cycle detected in task network involving '{0}'")]
    NetworkCycle(String),

    #[error("Network invariant violated: {0}")]
    InvalidNetwork(String),

    #[error("Network has not been built; call build_network first")]
    NetworkNotBuilt,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TrackingError>;
