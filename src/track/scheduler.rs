// src/track/scheduler.rs

use std::collections::HashSet;

use tracing::{debug, info, trace, warn};

use crate::config::model::ConfigFile;
use crate::errors::{Result, TrackingError};
use crate::ident::{Ident, TaskArtifact, TaskName};
use crate::spec::{TaskSpec, DEFAULT_PRIORITY};
use crate::track::network::{ConcreteEdges, EdgeKind, Network};
use crate::track::queue::TrackQueue;
use crate::track::registry::{Registry, ReusePolicy};
use crate::track::status::{ArtifactStatus, TaskStatus};
use crate::track::task::Task;
use crate::track::{MAX_LOOP, MIN_PRIORITY};

/// Scheduler drives specs through their lifecycle.
///
/// It is responsible for:
/// - resolving queued names to concrete instances
/// - expanding the dependency network around everything queued
/// - picking the next runnable task, deferring tasks whose
///   dependencies are unfinished
/// - abandoning tasks whose ancestors failed, and halting tasks that
///   starve, so their cleanup variants still run
/// - recording the order in which tasks were dispatched
///
/// It never executes anything itself: callers dispatch the tasks it hands
/// out and report the outcome back through [`Scheduler::set_status`].
#[derive(Debug, Default)]
pub struct Scheduler {
    registry: Registry,
    network: Network,
    queue: TrackQueue,
}

impl Scheduler {
    pub fn new(reuse: ReusePolicy) -> Self {
        Scheduler {
            registry: Registry::new(reuse),
            network: Network::new(),
            queue: TrackQueue::new(),
        }
    }

    /// Construct a scheduler from a validated [`ConfigFile`], registering
    /// every spec it declares.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut scheduler = Scheduler::new(cfg.reuse_policy());
        for spec in cfg.specs() {
            scheduler.register_spec(spec.clone())?;
        }
        Ok(scheduler)
    }

    pub fn register_spec(&mut self, spec: TaskSpec) -> Result<()> {
        self.registry.register_spec(spec)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolves a name to a concrete instance and queues it. Returns the
    /// instance name, or `None` when the spec is disabled. Entries queued
    /// `from_user` become goals: they are linked to the network root.
    pub fn queue_entry(&mut self, name: &TaskName, from_user: bool) -> Result<Option<TaskName>> {
        let Some(instance) = self.registry.instantiate_spec(name)? else {
            return Ok(None);
        };
        let ident = Ident::Task(instance.clone());
        let priority = self.priority_for(&ident);
        self.queue.queue(ident.clone(), priority, from_user);
        if from_user {
            self.network.link_root(&ident)?;
        }
        Ok(Some(instance))
    }

    /// Queues an artifact so the network pulls in its producers.
    pub fn queue_artifact(&mut self, artifact: &TaskArtifact, from_user: bool) -> Result<()> {
        if from_user && !artifact.is_concrete() {
            return Err(TrackingError::NotConcrete(artifact.to_string()));
        }
        self.registry.note_artifact(artifact);
        let ident = Ident::Artifact(artifact.clone());
        self.queue.queue(ident.clone(), DEFAULT_PRIORITY, from_user);
        if from_user {
            self.network.link_root(&ident)?;
        }
        Ok(())
    }

    /// Pops the highest priority entry without scheduling it. The entry
    /// stays active; mostly useful for inspection and tests.
    pub fn deque_entry(&mut self) -> Option<Ident> {
        self.queue.deque()
    }

    /// Drops every pending entry. Dispatched tasks keep their status; the
    /// execution trace survives.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Expands the network to cover everything currently queued.
    ///
    /// Call again after registering or queueing new specs, typically after
    /// a job body has run; expansion is incremental and idempotent.
    pub fn build_network(&mut self) -> Result<()> {
        let seeds: Vec<Ident> = self.queue.active().cloned().collect();
        self.network.build(&mut self.registry, &seeds)
    }

    pub fn validate_network(&self) -> Result<()> {
        self.network.validate()
    }

    /// Inserts a concrete edge by hand; `None` links `from` to the root.
    pub fn connect(&mut self, from: &Ident, to: Option<&Ident>) -> Result<()> {
        self.network.connect(from, to)
    }

    /// Sorted adjacency summary of one network node.
    pub fn concrete_edges(&self, ident: &Ident) -> Result<ConcreteEdges> {
        self.network.concrete_edges(ident)
    }

    pub fn get_status(&self, name: &TaskName) -> TaskStatus {
        self.registry.get_status(name)
    }

    /// Reports a dispatched task's outcome. Returns false when the name
    /// was never dispatched. A terminal status puts the entry back before
    /// the scheduler so the follow-on work (cleanup, job heads, abandoning
    /// dependents) happens on the next call to [`Scheduler::next_for`].
    pub fn set_status(&mut self, name: &TaskName, status: TaskStatus) -> bool {
        let changed = self.registry.set_status(name, status);
        if changed && status.is_terminal() {
            let ident = Ident::Task(name.clone());
            let priority = self.queue.priority_of(&ident);
            self.queue.ensure_queued(&ident, priority);
        }
        changed
    }

    pub fn artifact_status(&self, artifact: &TaskArtifact) -> ArtifactStatus {
        self.registry.artifact_status(artifact)
    }

    pub fn set_artifact_status(&mut self, artifact: &TaskArtifact, status: ArtifactStatus) {
        self.registry.set_artifact_status(artifact, status);
    }

    /// Every dispatched task name, in dispatch order.
    pub fn execution_trace(&self) -> &[TaskName] {
        self.queue.execution_trace()
    }

    /// The user's goals with their current status, sorted by name.
    pub fn user_goal_statuses(&self) -> Vec<(TaskName, TaskStatus)> {
        let mut out: Vec<(TaskName, TaskStatus)> = self
            .queue
            .user_requested()
            .filter_map(|ident| match ident {
                Ident::Task(name) => Some((name.clone(), self.registry.get_status(name))),
                Ident::Artifact(_) => None,
            })
            .collect();
        out.sort();
        out
    }

    /// User goals that gave up, for end-of-run reporting.
    pub fn halted_user_tasks(&self) -> Vec<TaskName> {
        self.user_goal_statuses()
            .into_iter()
            .filter(|(_, status)| *status == TaskStatus::Halted)
            .map(|(name, _)| name)
            .collect()
    }

    /// Whether nothing is waiting in the queue.
    pub fn is_idle(&self) -> bool {
        !self.queue.has_pending()
    }

    /// Picks the next runnable task, working the queue until one is
    /// dispatchable or nothing is left.
    ///
    /// Every pop advances some entry's lifecycle: fresh instances move to
    /// `Wait`, waiting tasks either dispatch, defer behind their unmet
    /// dependencies (decaying a little each time), or inherit an
    /// ancestor's fate; finished tasks trigger their cleanup variant and,
    /// for job bodies, their head. The per-call loop is bounded, so `None`
    /// means nothing is currently dispatchable, not that the run is over.
    pub fn next_for(&mut self) -> Result<Option<Task>> {
        if !self.network.is_built() {
            return Err(TrackingError::NetworkNotBuilt);
        }
        let mut seen: HashSet<Ident> = HashSet::new();
        for _ in 0..MAX_LOOP {
            let Some(ident) = self.queue.deque() else {
                return Ok(None);
            };
            if !seen.insert(ident.clone()) {
                // The sweep came back around without dispatching anything;
                // put the entry back and yield until something changes.
                let priority = self.queue.priority_of(&ident);
                self.queue.ensure_queued(&ident, priority);
                return Ok(None);
            }
            match ident {
                Ident::Artifact(artifact) => self.step_artifact(artifact)?,
                Ident::Task(name) => {
                    if let Some(task) = self.step_task(name)? {
                        return Ok(Some(task));
                    }
                }
            }
        }
        warn!("scheduling loop guard hit; yielding");
        Ok(None)
    }

    fn step_task(&mut self, name: TaskName) -> Result<Option<Task>> {
        let ident = Ident::Task(name.clone());
        match self.registry.get_status(&name) {
            TaskStatus::Named => {
                warn!(%name, "queued name has no spec; dropping");
                self.queue.deactivate(&ident);
                Ok(None)
            }
            TaskStatus::Init => {
                self.registry.force_status(&name, TaskStatus::Wait);
                let priority = self.priority_for(&ident);
                self.queue.ensure_queued(&ident, priority);
                Ok(None)
            }
            TaskStatus::Wait => self.step_waiting(name),
            TaskStatus::Running => {
                // Nothing to decide yet. The terminal set_status puts the
                // entry back in front of the scheduler.
                trace!(%name, "still running");
                Ok(None)
            }
            TaskStatus::Success => {
                self.finish_success(&name)?;
                Ok(None)
            }
            TaskStatus::Failed => {
                debug!(%name, "task failed; dependents will be abandoned");
                self.queue.deactivate(&ident);
                Ok(None)
            }
            TaskStatus::Halted => {
                self.queue_cleanup_for(&name)?;
                self.queue.deactivate(&ident);
                Ok(None)
            }
            TaskStatus::Dead => {
                self.queue.deactivate(&ident);
                Ok(None)
            }
        }
    }

    /// Decides what to do with a task whose turn has come up.
    ///
    /// Cleanup edges are ignored here: a cleanup task runs no matter how
    /// its parent ended.
    fn step_waiting(&mut self, name: TaskName) -> Result<Option<Task>> {
        let ident = Ident::Task(name.clone());
        let gating: Vec<(Ident, EdgeKind)> = self
            .network
            .dependencies_of(&ident)
            .into_iter()
            .filter(|(_, kind)| *kind == EdgeKind::Dep)
            .collect();

        if let Some((poisoner, _)) = gating.iter().find(|(pred, _)| self.pred_poisons(pred)) {
            warn!(%name, pred = %poisoner, "abandoning task; predecessor failed");
            self.registry.force_status(&name, TaskStatus::Dead);
            let priority = self.queue.priority_of(&ident);
            self.queue.ensure_queued(&ident, priority);
            return Ok(None);
        }

        if let Some((halted, _)) = gating.iter().find(|(pred, _)| self.pred_halted(pred)) {
            debug!(%name, pred = %halted, "halting task; predecessor halted");
            self.registry.force_status(&name, TaskStatus::Halted);
            let priority = self.queue.priority_of(&ident);
            self.queue.ensure_queued(&ident, priority);
            return Ok(None);
        }

        let unmet: Vec<Ident> = gating
            .iter()
            .filter(|(pred, _)| !self.pred_satisfied(pred))
            .map(|(pred, _)| pred.clone())
            .collect();

        if unmet.is_empty() {
            let task = self.dispatch(&name)?;
            return Ok(Some(task));
        }

        for pred in &unmet {
            if self.pred_needs_nudge(pred) {
                let priority = self.priority_for(pred);
                self.queue.ensure_queued(pred, priority);
            }
        }
        if self.any_running(&unmet) {
            // A predecessor is executing; wait without losing priority.
            let priority = self.queue.priority_of(&ident);
            self.queue.ensure_queued(&ident, priority);
            return Ok(None);
        }
        let decayed = self.queue.decay(&ident);
        if decayed < MIN_PRIORITY {
            warn!(%name, "priority exhausted waiting on dependencies; halting");
            self.registry.force_status(&name, TaskStatus::Halted);
        } else {
            trace!(%name, priority = decayed, "deferred behind unmet dependencies");
        }
        self.queue.ensure_queued(&ident, decayed);
        Ok(None)
    }

    fn step_artifact(&mut self, artifact: TaskArtifact) -> Result<()> {
        let ident = Ident::Artifact(artifact.clone());
        if self.registry.artifact_status(&artifact).is_satisfied() {
            self.queue.deactivate(&ident);
            return Ok(());
        }
        let preds = self.network.dependencies_of(&ident);
        let unmet: Vec<Ident> = preds
            .iter()
            .filter(|(pred, _)| !self.pred_satisfied(pred))
            .map(|(pred, _)| pred.clone())
            .collect();
        if !preds.is_empty() && unmet.is_empty() {
            debug!(%artifact, "all producers finished; marking available");
            self.registry
                .set_artifact_status(&artifact, ArtifactStatus::Exists);
            self.queue.deactivate(&ident);
            return Ok(());
        }
        self.registry
            .set_artifact_status(&artifact, ArtifactStatus::Stale);
        for pred in &unmet {
            if self.pred_needs_nudge(pred) {
                let priority = self.priority_for(pred);
                self.queue.ensure_queued(pred, priority);
            }
        }
        if self.any_running(&unmet) {
            let priority = self.queue.priority_of(&ident);
            self.queue.ensure_queued(&ident, priority);
            return Ok(());
        }
        let decayed = self.queue.decay(&ident);
        if decayed < MIN_PRIORITY {
            warn!(%artifact, "artifact never became available; giving up");
            self.queue.deactivate(&ident);
        } else {
            self.queue.ensure_queued(&ident, decayed);
        }
        Ok(())
    }

    fn dispatch(&mut self, name: &TaskName) -> Result<Task> {
        let mut task = self.registry.make_task(name)?;
        self.registry.set_status(name, TaskStatus::Running);
        task.status = TaskStatus::Running;
        self.queue.record_dispatch(name);
        info!(%name, "dispatching");
        Ok(task)
    }

    /// Follow-on work for a finished task: its cleanup variant always
    /// runs, and a job body hands over to its head.
    fn finish_success(&mut self, name: &TaskName) -> Result<()> {
        debug!(%name, "task succeeded");
        self.queue_cleanup_for(name)?;
        if let Some(head) = self.registry.head_of(name).cloned() {
            let head_ident = Ident::Task(head);
            let priority = self.priority_for(&head_ident);
            self.queue.queue(head_ident.clone(), priority, false);
            self.network
                .connect(&Ident::Task(name.clone()), Some(&head_ident))?;
            self.network.link_root(&head_ident)?;
        }
        self.queue.deactivate(&Ident::Task(name.clone()));
        Ok(())
    }

    fn queue_cleanup_for(&mut self, parent: &TaskName) -> Result<()> {
        if parent.is_cleanup() {
            return Ok(());
        }
        let cleanup = self.registry.instantiate_cleanup(parent)?;
        let ident = Ident::Task(cleanup);
        let priority = self.priority_for(&ident);
        self.queue.queue(ident.clone(), priority, false);
        self.network
            .connect(&Ident::Task(parent.clone()), Some(&ident))?;
        self.network.link_root(&ident)?;
        Ok(())
    }

    fn pred_satisfied(&self, pred: &Ident) -> bool {
        match pred {
            Ident::Task(name) => self.registry.get_status(name).satisfies_dependents(),
            Ident::Artifact(artifact) => self.registry.artifact_status(artifact).is_satisfied(),
        }
    }

    /// Whether an unmet predecessor needs to be put before the scheduler.
    /// Running tasks are already on their way; their completion re-queues
    /// them.
    fn pred_needs_nudge(&self, pred: &Ident) -> bool {
        match pred {
            Ident::Task(name) => matches!(
                self.registry.get_status(name),
                TaskStatus::Named | TaskStatus::Init | TaskStatus::Wait
            ),
            Ident::Artifact(_) => true,
        }
    }

    fn any_running(&self, preds: &[Ident]) -> bool {
        preds.iter().any(|pred| match pred {
            Ident::Task(name) => self.registry.get_status(name) == TaskStatus::Running,
            Ident::Artifact(_) => false,
        })
    }

    fn pred_poisons(&self, pred: &Ident) -> bool {
        match pred {
            Ident::Task(name) => self.registry.get_status(name).poisons_dependents(),
            Ident::Artifact(_) => false,
        }
    }

    fn pred_halted(&self, pred: &Ident) -> bool {
        match pred {
            Ident::Task(name) => self.registry.get_status(name) == TaskStatus::Halted,
            Ident::Artifact(_) => false,
        }
    }

    fn priority_for(&self, ident: &Ident) -> i32 {
        match ident {
            Ident::Task(name) => self
                .registry
                .spec(name)
                .map(|spec| spec.priority)
                .unwrap_or(DEFAULT_PRIORITY),
            Ident::Artifact(_) => DEFAULT_PRIORITY,
        }
    }
}
