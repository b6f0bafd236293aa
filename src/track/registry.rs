// src/track/registry.rs

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{Result, TrackingError};
use crate::ident::{Ident, TaskArtifact, TaskName};
use crate::spec::{Relation, TaskKind, TaskSpec, Value};
use crate::track::status::{ArtifactStatus, TaskStatus};
use crate::track::task::{Task, JOB_HEAD_KEY};

/// Which existing instance satisfies a relation when several could.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReusePolicy {
    /// Prefer the instance registered last.
    #[default]
    MostRecent,
    /// Prefer the instance registered first.
    FirstRegistered,
}

/// Store of everything the tracker knows by name: abstract spec templates,
/// concrete instances, dispatched tasks, artifact states and the
/// producer/consumer indexes that tie artifacts to specs.
///
/// Registration is inert. Specs only gain behaviour once instantiated,
/// and instances only run once the scheduler makes a [`Task`] for them.
#[derive(Debug, Default)]
pub struct Registry {
    specs: HashMap<TaskName, TaskSpec>,
    /// Abstract name to its concrete instances, in creation order.
    instances: HashMap<TaskName, Vec<TaskName>>,
    tasks: HashMap<TaskName, Task>,
    /// Status of concrete names that have no task object yet.
    statuses: HashMap<TaskName, TaskStatus>,
    artifacts: HashMap<TaskArtifact, ArtifactStatus>,
    producers: HashMap<TaskArtifact, BTreeSet<TaskName>>,
    consumers: HashMap<TaskArtifact, BTreeSet<TaskName>>,
    /// Cleanup instance to the instance it cleans up after, and back.
    cleanup_parents: HashMap<TaskName, TaskName>,
    cleanup_of: HashMap<TaskName, TaskName>,
    /// Job body instance to its minted head instance.
    job_heads: HashMap<TaskName, TaskName>,
    reuse: ReusePolicy,
}

impl Registry {
    pub fn new(reuse: ReusePolicy) -> Self {
        Registry {
            reuse,
            ..Registry::default()
        }
    }

    /// Stores a spec under its name.
    ///
    /// Registering the identical spec again is a no-op; a different spec
    /// under a taken name is a conflict. Registration also records the
    /// spec's artifact relations and synthesizes the implicit cleanup
    /// template (and, for jobs, the head template), so those names resolve
    /// even before anything is queued.
    pub fn register_spec(&mut self, spec: TaskSpec) -> Result<()> {
        if let Some(existing) = self.specs.get(&spec.name) {
            if *existing == spec {
                return Ok(());
            }
            return Err(TrackingError::SpecConflict(spec.name.to_string()));
        }
        let derived = self.derived_templates(&spec);
        debug!(name = %spec.name, kind = ?spec.kind, "registered spec");
        if spec.name.is_concrete() {
            self.record_instance(spec)?;
        } else {
            self.index_artifacts(&spec);
            self.specs.insert(spec.name.clone(), spec);
        }
        for template in derived {
            self.register_spec(template)?;
        }
        Ok(())
    }

    /// Implicit companions of a spec: its cleanup template, and for jobs
    /// the abstract head template.
    fn derived_templates(&self, spec: &TaskSpec) -> Vec<TaskSpec> {
        let mut derived = Vec::new();
        if !spec.name.is_cleanup() {
            let cleanup = spec.cleanup_spec(&spec.name.de_uniq());
            if !self.specs.contains_key(&cleanup.name) {
                derived.push(cleanup);
            }
        }
        if spec.kind == TaskKind::Job && !spec.name.is_head() {
            let head = spec.head_spec(&spec.name.de_uniq());
            if !self.specs.contains_key(&head.name) {
                derived.push(head);
            }
        }
        derived
    }

    fn index_artifacts(&mut self, spec: &TaskSpec) {
        for rel in &spec.required_for {
            if let Ident::Artifact(artifact) = &rel.target {
                self.note_artifact(artifact);
                self.producers
                    .entry(artifact.clone())
                    .or_default()
                    .insert(spec.name.clone());
            }
        }
        for rel in &spec.depends_on {
            if let Ident::Artifact(artifact) = &rel.target {
                self.note_artifact(artifact);
                self.consumers
                    .entry(artifact.clone())
                    .or_default()
                    .insert(spec.name.clone());
            }
        }
    }

    pub fn contains_spec(&self, name: &TaskName) -> bool {
        self.specs.contains_key(name)
    }

    pub fn spec(&self, name: &TaskName) -> Option<&TaskSpec> {
        self.specs.get(name)
    }

    /// Registered abstract spec names, sorted.
    pub fn spec_names(&self) -> Vec<&TaskName> {
        let mut names: Vec<&TaskName> = self
            .specs
            .keys()
            .filter(|name| !name.is_concrete())
            .collect();
        names.sort();
        names
    }

    /// Concrete instances of an abstract name, in creation order.
    pub fn instances_of(&self, name: &TaskName) -> &[TaskName] {
        self.instances.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn concrete_spec(&self, name: &TaskName) -> Result<&TaskSpec> {
        if !name.is_concrete() {
            return Err(TrackingError::NotConcrete(name.to_string()));
        }
        self.specs
            .get(name)
            .ok_or_else(|| TrackingError::UnknownTask(name.to_string()))
    }

    /// Resolves an abstract name to a concrete instance, minting one when
    /// no existing instance can be reused. Returns `None` for disabled
    /// specs, which are never instantiated.
    pub fn instantiate_spec(&mut self, name: &TaskName) -> Result<Option<TaskName>> {
        if name.is_concrete() {
            return if self.specs.contains_key(name) {
                Ok(Some(name.clone()))
            } else {
                Err(TrackingError::UnknownTask(name.to_string()))
            };
        }
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| TrackingError::UnknownTask(name.to_string()))?;
        if spec.is_disabled() {
            warn!(%name, "skipping disabled spec");
            return Ok(None);
        }
        if let Some(existing) = self.pick_instance(name, |_| true) {
            return Ok(Some(existing));
        }
        let merged = self.resolve_chain(name)?;
        let inst = merged.instantiate();
        let inst_name = inst.name.clone();
        self.record_instance(inst)?;
        Ok(Some(inst_name))
    }

    /// Resolves a task relation of `control` to a concrete instance.
    ///
    /// An existing instance is reused when the relation accepts it under
    /// the configured policy; otherwise a fresh instance is minted and the
    /// relation's injection applied to it. Disabled targets resolve to
    /// `None`.
    pub fn instantiate_relation(
        &mut self,
        control: &TaskName,
        rel: &Relation,
    ) -> Result<Option<TaskName>> {
        let Ident::Task(target) = &rel.target else {
            return Err(TrackingError::InvalidNetwork(format!(
                "relation of {control} targets an artifact where a task is required"
            )));
        };
        if target.is_concrete() {
            return if self.specs.contains_key(target) {
                Ok(Some(target.clone()))
            } else {
                Err(TrackingError::UnknownTask(target.to_string()))
            };
        }
        let control_spec = self.concrete_spec(control)?.clone();
        let target_spec = self
            .specs
            .get(target)
            .ok_or_else(|| TrackingError::UnknownTask(target.to_string()))?;
        if target_spec.is_disabled() {
            warn!(%target, %control, "skipping relation to disabled spec");
            return Ok(None);
        }
        if let Some(existing) = self.pick_instance(target, |candidate| {
            rel.accepts(&control_spec, candidate)
        }) {
            debug!(%control, instance = %existing, "reusing instance for relation");
            return Ok(Some(existing));
        }
        let merged = self.resolve_chain(target)?;
        let mut inst = merged.instantiate();
        self.apply_injection(&control_spec, rel, &mut inst)?;
        let inst_name = inst.name.clone();
        self.record_instance(inst)?;
        debug!(%control, instance = %inst_name, "instantiated relation target");
        Ok(Some(inst_name))
    }

    /// Copies the relation's injected parameters from `control` onto
    /// `target`, then checks every key `target` insists on is present.
    pub fn apply_injection(
        &self,
        control: &TaskSpec,
        rel: &Relation,
        target: &mut TaskSpec,
    ) -> Result<()> {
        if let Some(injection) = &rel.injection {
            let rendered =
                injection
                    .render(&control.extra)
                    .map_err(|e| TrackingError::InjectionFailed {
                        target: target.name.to_string(),
                        reason: e.to_string(),
                    })?;
            target.extra.extend(rendered);
            for key in &target.must_inject {
                if !target.extra.contains_key(key) {
                    return Err(TrackingError::InjectionFailed {
                        target: target.name.to_string(),
                        reason: format!("required key '{key}' was not injected"),
                    });
                }
            }
        }
        Ok(())
    }

    fn pick_instance<F>(&self, name: &TaskName, mut accept: F) -> Option<TaskName>
    where
        F: FnMut(&TaskSpec) -> bool,
    {
        let list = self.instances.get(name)?;
        let pick = |inst: &&TaskName| {
            self.specs
                .get(*inst)
                .map(|spec| accept(spec))
                .unwrap_or(false)
        };
        let found = match self.reuse {
            ReusePolicy::MostRecent => list.iter().rev().find(pick),
            ReusePolicy::FirstRegistered => list.iter().find(pick),
        };
        found.map(|name| (*name).clone())
    }

    /// Merges a spec over its listed sources, in order, so later sources
    /// and finally the spec itself win.
    fn resolve_chain(&self, name: &TaskName) -> Result<TaskSpec> {
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| TrackingError::UnknownTask(name.to_string()))?;
        let mut acc: Option<TaskSpec> = None;
        for source in &spec.sources {
            let base = self
                .specs
                .get(source)
                .ok_or_else(|| TrackingError::UnregisteredSource {
                    spec: name.to_string(),
                    source: source.to_string(),
                })?;
            acc = Some(match acc {
                None => base.clone(),
                Some(folded) => base.merged_over(&folded),
            });
        }
        Ok(match acc {
            None => spec.clone(),
            Some(folded) => spec.merged_over(&folded),
        })
    }

    fn record_instance(&mut self, inst: TaskSpec) -> Result<()> {
        let name = inst.name.clone();
        let is_job_body = inst.kind == TaskKind::Job && !name.is_head();
        if let Some(existing) = self.specs.get(&name) {
            if *existing != inst {
                return Err(TrackingError::SpecConflict(name.to_string()));
            }
            return Ok(());
        }
        self.index_artifacts(&inst);
        self.instances
            .entry(name.de_uniq())
            .or_default()
            .push(name.clone());
        self.specs.insert(name.clone(), inst.clone());
        if is_job_body {
            let head = inst.head_spec(&name).instantiate();
            let head_name = head.name.clone();
            self.record_instance(head)?;
            self.job_heads.insert(name, head_name);
        }
        Ok(())
    }

    /// The head instance minted alongside a job body instance.
    pub fn head_of(&self, body: &TaskName) -> Option<&TaskName> {
        self.job_heads.get(body)
    }

    /// Mints the cleanup instance for a finished parent instance, reusing
    /// the one already minted if this is asked twice.
    pub fn instantiate_cleanup(&mut self, parent: &TaskName) -> Result<TaskName> {
        if let Some(existing) = self.cleanup_of.get(parent) {
            return Ok(existing.clone());
        }
        let parent_spec = self.concrete_spec(parent)?.clone();
        let inst = parent_spec.cleanup_spec(parent).instantiate();
        let inst_name = inst.name.clone();
        self.record_instance(inst)?;
        self.cleanup_parents
            .insert(inst_name.clone(), parent.clone());
        self.cleanup_of.insert(parent.clone(), inst_name.clone());
        Ok(inst_name)
    }

    /// Builds (or returns) the task object for a concrete instance.
    ///
    /// Cleanup tasks inherit their parent's final state. Fails when a key
    /// the spec lists in `must_inject` never arrived.
    pub fn make_task(&mut self, name: &TaskName) -> Result<Task> {
        if let Some(task) = self.tasks.get(name) {
            return Ok(task.clone());
        }
        let spec = self.concrete_spec(name)?.clone();
        let mut task = Task::new(spec);
        if let Some(parent) = self.cleanup_parents.get(name) {
            if let Some(parent_task) = self.tasks.get(parent) {
                task.state.extend(parent_task.state.clone());
            }
        }
        if let Some(head) = self.job_heads.get(name) {
            task.state
                .insert(JOB_HEAD_KEY.to_owned(), Value::Str(head.to_string()));
        }
        for key in &task.spec.must_inject {
            if !task.state.contains_key(key) {
                return Err(TrackingError::InjectionFailed {
                    target: name.to_string(),
                    reason: format!("required key '{key}' missing at dispatch"),
                });
            }
        }
        self.statuses.remove(name);
        self.tasks.insert(name.clone(), task.clone());
        Ok(task)
    }

    pub fn task(&self, name: &TaskName) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Status of any name, known or not.
    ///
    /// Unknown names are `Named`; registered but untouched names are
    /// `Init`; everything else reports its recorded status.
    pub fn get_status(&self, name: &TaskName) -> TaskStatus {
        if let Some(task) = self.tasks.get(name) {
            return task.status;
        }
        if let Some(status) = self.statuses.get(name) {
            return *status;
        }
        if self.specs.contains_key(name) {
            return TaskStatus::Init;
        }
        TaskStatus::Named
    }

    /// Sets the status of a dispatched task. Returns false when the name
    /// has no task object yet.
    pub fn set_status(&mut self, name: &TaskName, status: TaskStatus) -> bool {
        match self.tasks.get_mut(name) {
            Some(task) => {
                debug!(%name, %status, "status change");
                task.status = status;
                true
            }
            None => false,
        }
    }

    /// Records a status for a name regardless of whether it was ever
    /// dispatched.
    pub(crate) fn force_status(&mut self, name: &TaskName, status: TaskStatus) {
        debug!(%name, %status, "status change");
        match self.tasks.get_mut(name) {
            Some(task) => task.status = status,
            None => {
                self.statuses.insert(name.clone(), status);
            }
        }
    }

    pub fn note_artifact(&mut self, artifact: &TaskArtifact) {
        self.artifacts.entry(artifact.clone()).or_default();
    }

    pub fn artifact_status(&self, artifact: &TaskArtifact) -> ArtifactStatus {
        self.artifacts
            .get(artifact)
            .copied()
            .unwrap_or(ArtifactStatus::Declared)
    }

    pub fn set_artifact_status(&mut self, artifact: &TaskArtifact, status: ArtifactStatus) {
        self.artifacts.insert(artifact.clone(), status);
    }

    /// Concrete artifacts already known that fall under a glob.
    pub fn concrete_artifacts_matching(&self, pattern: &TaskArtifact) -> Vec<TaskArtifact> {
        let mut out: Vec<TaskArtifact> = self
            .artifacts
            .keys()
            .filter(|known| known.is_concrete() && pattern.matches(known))
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Spec names producing exactly this artifact.
    pub fn producers_of(&self, artifact: &TaskArtifact) -> Vec<TaskName> {
        self.producers
            .get(artifact)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Spec names whose produced artifact covers this concrete one, either
    /// exactly or through a glob.
    pub fn producers_matching(&self, artifact: &TaskArtifact) -> Vec<TaskName> {
        let mut out = BTreeSet::new();
        for (produced, specs) in &self.producers {
            if produced == artifact || (!produced.is_concrete() && produced.matches(artifact)) {
                out.extend(specs.iter().cloned());
            }
        }
        out.into_iter().collect()
    }

    /// Spec names consuming this artifact, for diagnostics.
    pub fn consumers_of(&self, artifact: &TaskArtifact) -> Vec<TaskName> {
        self.consumers
            .get(artifact)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}
