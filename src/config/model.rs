// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::spec::{TaskKind, TaskSpec, Value, DEFAULT_PRIORITY};
use crate::track::ReusePolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// reuse_policy = "most-recent"
///
/// [task."data::fetch"]
/// cmd = "curl -o raw.csv https://example.test/raw"
/// required_for = ["file:raw.csv"]
///
/// [task."data::report"]
/// cmd = "report --src {src_dir}"
/// depends_on = [
///     "file:raw.csv",
///     { task = "data::env", constraints = ["profile"], inject = { src_dir = "{workdir}" } },
/// ]
/// ```
///
/// This is the raw shape only; semantic validation happens when it is
/// converted into a [`ConfigFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All specs from `[task."group::name"]`, keyed by name.
    #[serde(default)]
    pub task: BTreeMap<String, RawTaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Which existing instance satisfies a relation when several could.
    #[serde(default)]
    pub reuse_policy: ReusePolicy,
}

/// `[task."group::name"]` section.
///
/// Reserved keys are listed here; every other key in the table lands in
/// `extra` and becomes a task parameter, including `cmd`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTaskConfig {
    #[serde(default)]
    pub kind: TaskKind,

    /// Names this spec inherits from, closest ancestor last.
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub depends_on: Vec<RawRelation>,

    #[serde(default)]
    pub required_for: Vec<RawRelation>,

    /// Extra requirements of the derived cleanup task.
    #[serde(default)]
    pub cleanup: Vec<RawRelation>,

    /// Parameter keys that must be injected before an instance may run.
    #[serde(default)]
    pub must_inject: Vec<String>,

    /// Registered but never instantiated or queued.
    #[serde(default)]
    pub disabled: bool,

    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Free-form task parameters.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// One entry of `depends_on` / `required_for` / `cleanup`: either a bare
/// target string, or a table carrying constraints and injections.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRelation {
    Target(String),
    Detailed {
        #[serde(default)]
        task: Option<String>,
        #[serde(default)]
        file: Option<String>,
        #[serde(default)]
        constraints: Vec<String>,
        #[serde(default)]
        inject: BTreeMap<String, String>,
    },
}

/// Validated configuration: every task table parsed into a [`TaskSpec`],
/// names well formed, references resolvable, declared relations acyclic.
///
/// Constructed via `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    specs: Vec<TaskSpec>,
}

impl ConfigFile {
    /// Construct without validation. Only `TryFrom<RawConfigFile>` should
    /// call this.
    pub(crate) fn new_unchecked(config: ConfigSection, specs: Vec<TaskSpec>) -> Self {
        ConfigFile { config, specs }
    }

    pub fn reuse_policy(&self) -> ReusePolicy {
        self.config.reuse_policy
    }

    /// The declared specs, in config order.
    pub fn specs(&self) -> &[TaskSpec] {
        &self.specs
    }
}
