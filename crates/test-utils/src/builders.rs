#![allow(dead_code)]

use std::collections::BTreeMap;

use taskdag::config::{ConfigFile, ConfigSection, RawConfigFile, RawRelation, RawTaskConfig};
use taskdag::ident::{TaskArtifact, TaskName};
use taskdag::spec::{MetaFlag, Relation, TaskKind, TaskSpec, Value, DEFAULT_PRIORITY};
use taskdag::track::ReusePolicy;

/// Parse a task name, panicking on bad input.
pub fn task_name(s: &str) -> TaskName {
    s.parse().expect("valid task name")
}

/// Parse an artifact path, panicking on bad input.
pub fn artifact(s: &str) -> TaskArtifact {
    s.parse().expect("valid artifact path")
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: RawTaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_reuse_policy(mut self, policy: ReusePolicy) -> Self {
        self.config.config.reuse_policy = policy;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RawTaskConfig`.
pub struct TaskConfigBuilder {
    task: RawTaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self {
            task: RawTaskConfig {
                kind: TaskKind::Plain,
                sources: vec![],
                depends_on: vec![],
                required_for: vec![],
                cleanup: vec![],
                must_inject: vec![],
                disabled: false,
                priority: DEFAULT_PRIORITY,
                extra: BTreeMap::new(),
            },
        }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.task.extra.insert("cmd".to_string(), Value::from(cmd));
        self
    }

    pub fn source(mut self, name: &str) -> Self {
        self.task.sources.push(name.to_string());
        self
    }

    pub fn depends_on(mut self, target: &str) -> Self {
        self.task.depends_on.push(RawRelation::Target(target.to_string()));
        self
    }

    pub fn required_for(mut self, target: &str) -> Self {
        self.task
            .required_for
            .push(RawRelation::Target(target.to_string()));
        self
    }

    pub fn cleanup(mut self, target: &str) -> Self {
        self.task.cleanup.push(RawRelation::Target(target.to_string()));
        self
    }

    /// A `depends_on` entry in the detailed table form.
    pub fn depends_on_with(
        mut self,
        task: &str,
        constraints: &[&str],
        inject: &[(&str, &str)],
    ) -> Self {
        self.task.depends_on.push(RawRelation::Detailed {
            task: Some(task.to_string()),
            file: None,
            constraints: constraints.iter().map(|s| s.to_string()).collect(),
            inject: inject
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self
    }

    pub fn job(mut self) -> Self {
        self.task.kind = TaskKind::Job;
        self
    }

    pub fn disabled(mut self, val: bool) -> Self {
        self.task.disabled = val;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn must_inject(mut self, key: &str) -> Self {
        self.task.must_inject.push(key.to_string());
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.task.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> RawTaskConfig {
        self.task
    }
}

impl Default for TaskConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskSpec` when a test wants to skip the TOML layer.
pub struct SpecBuilder {
    spec: TaskSpec,
}

impl SpecBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            spec: TaskSpec::new(task_name(name)),
        }
    }

    pub fn source(mut self, name: &str) -> Self {
        self.spec.sources.push(task_name(name));
        self
    }

    pub fn depends_on_task(mut self, name: &str) -> Self {
        self.spec.depends_on.push(Relation::task(task_name(name)));
        self
    }

    pub fn depends_on_artifact(mut self, path: &str) -> Self {
        self.spec.depends_on.push(Relation::artifact(artifact(path)));
        self
    }

    pub fn depends_on_rel(mut self, rel: Relation) -> Self {
        self.spec.depends_on.push(rel);
        self
    }

    pub fn required_for_task(mut self, name: &str) -> Self {
        self.spec.required_for.push(Relation::task(task_name(name)));
        self
    }

    pub fn required_for_artifact(mut self, path: &str) -> Self {
        self.spec.required_for.push(Relation::artifact(artifact(path)));
        self
    }

    pub fn cleanup_rel(mut self, rel: Relation) -> Self {
        self.spec.cleanup.push(rel);
        self
    }

    pub fn job(mut self) -> Self {
        self.spec.kind = TaskKind::Job;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.spec.meta.insert(MetaFlag::Disabled);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.spec.priority = priority;
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.spec.extra.insert("cmd".to_string(), Value::from(cmd));
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.spec.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn must_inject(mut self, key: &str) -> Self {
        self.spec.must_inject.push(key.to_string());
        self
    }

    pub fn build(self) -> TaskSpec {
        self.spec
    }
}
