// src/spec/task_spec.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::ident::TaskName;
use crate::spec::relation::Relation;
use crate::spec::value::Value;

/// Priority a spec starts with unless the config says otherwise.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Key in a spec's parameters holding the shell command to run.
pub const CMD_KEY: &str = "cmd";

/// Key holding the command of the derived cleanup variant. Specs without
/// one still get a cleanup task; it completes without running anything.
pub const CLEANUP_CMD_KEY: &str = "cleanup_cmd";

/// How instances of a spec execute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Runs once and completes.
    #[default]
    Plain,
    /// Runs a body that may register and queue further specs; a companion
    /// head task completes only after everything the body queued has run.
    Job,
}

/// Markers that change how the tracker treats a spec without changing
/// what it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MetaFlag {
    /// Spec is registered but never instantiated or queued.
    Disabled,
    /// Synthesized completion point of a job body.
    JobHead,
}

/// A declarative task template.
///
/// Specs are inert: registering one causes nothing to run. The tracker
/// instantiates specs into uniquely named concrete copies, links them into
/// the dependency network, and only then schedules them.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub name: TaskName,
    /// Ancestor chain this spec inherits from, closest ancestor last.
    pub sources: Vec<TaskName>,
    /// Targets that must complete before instances of this spec run.
    pub depends_on: Vec<Relation>,
    /// Targets that this spec's instances must precede or produce.
    pub required_for: Vec<Relation>,
    /// Extra requirements of the cleanup variant, beyond its parent.
    pub cleanup: Vec<Relation>,
    pub kind: TaskKind,
    pub meta: BTreeSet<MetaFlag>,
    /// Free-form parameters; seeds the instance state at dispatch.
    pub extra: BTreeMap<String, Value>,
    /// Keys that must be present in `extra` before an instance may run.
    pub must_inject: Vec<String>,
    pub priority: i32,
}

impl TaskSpec {
    pub fn new(name: TaskName) -> Self {
        TaskSpec {
            name,
            sources: Vec::new(),
            depends_on: Vec::new(),
            required_for: Vec::new(),
            cleanup: Vec::new(),
            kind: TaskKind::Plain,
            meta: BTreeSet::new(),
            extra: BTreeMap::new(),
            must_inject: Vec::new(),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.meta.contains(&MetaFlag::Disabled)
    }

    /// Overlays this spec on an ancestor, producing the merged spec.
    ///
    /// The result keeps this spec's name. Parameters merge with this spec's
    /// keys winning; relation groups concatenate with this spec's version
    /// replacing an ancestor relation on the same target; meta and
    /// `must_inject` union. `kind` and `priority` inherit from the ancestor
    /// when this spec left them at their defaults.
    pub fn merged_over(&self, base: &TaskSpec) -> TaskSpec {
        let mut extra = base.extra.clone();
        extra.extend(self.extra.clone());

        let mut meta = base.meta.clone();
        meta.extend(self.meta.iter().copied());

        let mut must_inject = base.must_inject.clone();
        for key in &self.must_inject {
            if !must_inject.contains(key) {
                must_inject.push(key.clone());
            }
        }

        TaskSpec {
            name: self.name.clone(),
            sources: self.sources.clone(),
            depends_on: merge_relations(&base.depends_on, &self.depends_on),
            required_for: merge_relations(&base.required_for, &self.required_for),
            cleanup: merge_relations(&base.cleanup, &self.cleanup),
            kind: if self.kind == TaskKind::Plain {
                base.kind
            } else {
                self.kind
            },
            meta,
            extra,
            must_inject,
            priority: if self.priority == DEFAULT_PRIORITY {
                base.priority
            } else {
                self.priority
            },
        }
    }

    /// A concrete copy of this spec under a fresh unique name.
    ///
    /// The abstract name is appended to `sources` so instances record
    /// their provenance.
    pub fn instantiate(&self) -> TaskSpec {
        let mut inst = self.clone();
        inst.name = self.name.with_uniq();
        if !self.name.is_concrete() && inst.sources.last() != Some(&self.name) {
            inst.sources.push(self.name.clone());
        }
        inst
    }

    pub fn head_name(&self) -> TaskName {
        self.name.de_uniq().with_head()
    }

    /// The companion head spec of a job, depending on `body`.
    ///
    /// Subtasks queued by the body declare `required_for` the head name,
    /// which places them between the body and the head in the network. The
    /// head itself runs no command; it only marks the point where the whole
    /// job is done.
    pub fn head_spec(&self, body: &TaskName) -> TaskSpec {
        let mut head = TaskSpec::new(self.head_name());
        head.sources = vec![self.name.de_uniq()];
        head.depends_on = vec![Relation::task(body.clone())];
        head.required_for = self.required_for.clone();
        head.meta.insert(MetaFlag::JobHead);
        head.extra = self.extra.clone();
        head.extra.remove(CMD_KEY);
        head.extra.remove(CLEANUP_CMD_KEY);
        head.priority = self.priority;
        head
    }

    pub fn cleanup_name(&self) -> TaskName {
        self.name.de_uniq().with_cleanup()
    }

    /// The cleanup variant of this spec, running after `parent`.
    ///
    /// Cleanup instances are scheduled once their parent reaches any
    /// terminal status, so the dependency on `parent` is satisfied by
    /// halting as well as success. The parent's `cleanup_cmd` parameter,
    /// if any, becomes the command of the cleanup task.
    pub fn cleanup_spec(&self, parent: &TaskName) -> TaskSpec {
        let mut cleanup = TaskSpec::new(self.cleanup_name());
        cleanup.sources = vec![self.name.de_uniq()];
        cleanup.depends_on = vec![Relation::task(parent.clone())];
        cleanup.depends_on.extend(self.cleanup.iter().cloned());
        cleanup.extra = self.extra.clone();
        cleanup.extra.remove(CMD_KEY);
        if let Some(cmd) = cleanup.extra.remove(CLEANUP_CMD_KEY) {
            cleanup.extra.insert(CMD_KEY.to_string(), cmd);
        }
        cleanup.priority = self.priority;
        cleanup
    }
}

fn merge_relations(base: &[Relation], over: &[Relation]) -> Vec<Relation> {
    let mut merged: Vec<Relation> = base.to_vec();
    for rel in over {
        match merged.iter_mut().find(|m| m.target == rel.target) {
            Some(slot) => *slot = rel.clone(),
            None => merged.push(rel.clone()),
        }
    }
    merged
}
