// src/track/network.rs

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef, Reversed};
use petgraph::Direction;
use tracing::{debug, trace};

use crate::errors::{Result, TrackingError};
use crate::ident::{Ident, TaskArtifact, TaskName};
use crate::track::registry::Registry;

/// A node of the dependency network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetNode {
    /// Synthetic sink every goal flows into.
    Root,
    Task(TaskName),
    Artifact(TaskArtifact),
}

impl fmt::Display for NetNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetNode::Root => f.write_str("root"),
            NetNode::Task(name) => write!(f, "{name}"),
            NetNode::Artifact(artifact) => write!(f, "{artifact}"),
        }
    }
}

impl From<Ident> for NetNode {
    fn from(ident: Ident) -> Self {
        match ident {
            Ident::Task(name) => NetNode::Task(name),
            Ident::Artifact(artifact) => NetNode::Artifact(artifact),
        }
    }
}

/// Edge label. Dependency checks skip `Cleanup` edges so a cleanup task
/// runs whatever became of its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Dep,
    Cleanup,
}

/// Sorted adjacency summary of one node, for introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcreteEdges {
    pub pred_tasks: Vec<TaskName>,
    pub pred_artifacts: Vec<TaskArtifact>,
    pub succ_tasks: Vec<TaskName>,
    pub succ_artifacts: Vec<TaskArtifact>,
    /// Whether the node feeds the root directly.
    pub root: bool,
}

/// The dependency network: a directed graph over concrete task instances
/// and artifacts, with edges pointing from dependency to dependent and a
/// synthetic root every goal flows into.
///
/// Edge direction means "must happen before": for `B` depending on `A`
/// the network holds `A -> B`, and user goals hold an edge to the root.
#[derive(Debug)]
pub struct Network {
    graph: DiGraph<NetNode, EdgeKind>,
    index: HashMap<NetNode, NodeIndex>,
    root: NodeIndex,
    expanded: HashSet<NodeIndex>,
    is_built: bool,
}

impl Default for Network {
    fn default() -> Self {
        Network::new()
    }
}

impl Network {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(NetNode::Root);
        let mut index = HashMap::new();
        index.insert(NetNode::Root, root);
        let mut expanded = HashSet::new();
        expanded.insert(root);
        Network {
            graph,
            index,
            root,
            expanded,
            is_built: false,
        }
    }

    /// Whether `build` has completed at least once.
    pub fn is_built(&self) -> bool {
        self.is_built
    }

    pub fn contains(&self, ident: &Ident) -> bool {
        self.index.contains_key(&NetNode::from(ident.clone()))
    }

    /// Node count including the root.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn ensure_node(&mut self, node: NetNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node, idx);
        idx
    }

    fn ensure_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, kind);
        }
    }

    /// Inserts an edge `from -> to`, or `from -> root` when `to` is absent.
    ///
    /// Both endpoints must be concrete; adding the same edge twice is a
    /// no-op. The edge is labelled `Cleanup` when it ties a cleanup task
    /// to its parent.
    pub fn connect(&mut self, from: &Ident, to: Option<&Ident>) -> Result<()> {
        ensure_concrete(from)?;
        if let Some(to) = to {
            ensure_concrete(to)?;
        }
        let from_idx = self.ensure_node(NetNode::from(from.clone()));
        let to_idx = match to {
            Some(to) => self.ensure_node(NetNode::from(to.clone())),
            None => self.root,
        };
        let kind = match to {
            Some(to) => edge_kind(from, to),
            None => EdgeKind::Dep,
        };
        trace!(%from, to = %self.graph[to_idx], "connecting");
        self.ensure_edge(from_idx, to_idx, kind);
        Ok(())
    }

    /// Links a node straight to the root, marking it a goal of the run.
    pub fn link_root(&mut self, ident: &Ident) -> Result<()> {
        self.connect(ident, None)
    }

    /// Expands the network to its closure.
    ///
    /// Every seed plus every node added but not yet expanded has its
    /// spec's relations walked: task targets are resolved to concrete
    /// instances (instantiating through the registry as needed), artifact
    /// targets become artifact nodes, and artifact nodes are tied to
    /// their producers. Repeats until nothing new appears. Idempotent.
    pub fn build(&mut self, registry: &mut Registry, seeds: &[Ident]) -> Result<()> {
        for ident in seeds {
            self.ensure_node(NetNode::from(ident.clone()));
        }
        loop {
            let pending: Vec<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|idx| !self.expanded.contains(idx))
                .collect();
            if pending.is_empty() {
                break;
            }
            for idx in pending {
                let node = self.graph[idx].clone();
                trace!(%node, "expanding");
                match &node {
                    NetNode::Root => {}
                    NetNode::Task(name) => self.expand_task(idx, name, registry)?,
                    NetNode::Artifact(artifact) => {
                        self.expand_artifact(idx, artifact, registry)?
                    }
                }
                self.expanded.insert(idx);
            }
        }
        self.is_built = true;
        debug!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "network built"
        );
        Ok(())
    }

    fn expand_task(&mut self, idx: NodeIndex, name: &TaskName, registry: &mut Registry) -> Result<()> {
        let spec = registry.concrete_spec(name)?.clone();
        for rel in &spec.depends_on {
            match &rel.target {
                Ident::Task(_) => {
                    let Some(dep) = registry.instantiate_relation(name, rel)? else {
                        continue;
                    };
                    let kind = edge_kind(&Ident::Task(dep.clone()), &Ident::Task(name.clone()));
                    let dep_idx = self.ensure_node(NetNode::Task(dep));
                    self.ensure_edge(dep_idx, idx, kind);
                }
                Ident::Artifact(artifact) => {
                    registry.note_artifact(artifact);
                    let a_idx = self.ensure_node(NetNode::Artifact(artifact.clone()));
                    self.ensure_edge(a_idx, idx, EdgeKind::Dep);
                }
            }
        }
        for rel in &spec.required_for {
            match &rel.target {
                Ident::Task(_) => {
                    let Some(succ) = registry.instantiate_relation(name, rel)? else {
                        continue;
                    };
                    let succ_idx = self.ensure_node(NetNode::Task(succ));
                    self.ensure_edge(idx, succ_idx, EdgeKind::Dep);
                }
                Ident::Artifact(artifact) => {
                    registry.note_artifact(artifact);
                    let a_idx = self.ensure_node(NetNode::Artifact(artifact.clone()));
                    self.ensure_edge(idx, a_idx, EdgeKind::Dep);
                }
            }
        }
        Ok(())
    }

    fn expand_artifact(
        &mut self,
        idx: NodeIndex,
        artifact: &TaskArtifact,
        registry: &mut Registry,
    ) -> Result<()> {
        if artifact.is_concrete() {
            for producer in registry.producers_matching(artifact) {
                let Some(inst) = registry.instantiate_spec(&producer)? else {
                    continue;
                };
                let p_idx = self.ensure_node(NetNode::Task(inst));
                self.ensure_edge(p_idx, idx, EdgeKind::Dep);
            }
        } else {
            // Concrete files already known to the registry that fall under
            // this glob become predecessors of the glob node.
            for concrete in registry.concrete_artifacts_matching(artifact) {
                let c_idx = self.ensure_node(NetNode::Artifact(concrete));
                self.ensure_edge(c_idx, idx, EdgeKind::Dep);
            }
            for producer in registry.producers_of(artifact) {
                let Some(inst) = registry.instantiate_spec(&producer)? else {
                    continue;
                };
                let p_idx = self.ensure_node(NetNode::Task(inst));
                self.ensure_edge(p_idx, idx, EdgeKind::Dep);
            }
        }
        Ok(())
    }

    /// Checks the built network is runnable: acyclic, fully expanded,
    /// every node flowing into the root, and every glob artifact backed by
    /// at least one concrete predecessor.
    pub fn validate(&self) -> Result<()> {
        if !self.is_built {
            return Err(TrackingError::NetworkNotBuilt);
        }
        if let Err(cycle) = toposort(&self.graph, None) {
            return Err(TrackingError::NetworkCycle(
                self.graph[cycle.node_id()].to_string(),
            ));
        }
        let unexpanded: Vec<String> = self
            .graph
            .node_indices()
            .filter(|idx| !self.expanded.contains(idx))
            .map(|idx| self.graph[idx].to_string())
            .collect();
        if !unexpanded.is_empty() {
            return Err(TrackingError::InvalidNetwork(format!(
                "nodes added after the last build: {}",
                unexpanded.join(", ")
            )));
        }

        let reversed = Reversed(&self.graph);
        let mut reachable = HashSet::new();
        let mut bfs = Bfs::new(reversed, self.root);
        while let Some(idx) = bfs.next(reversed) {
            reachable.insert(idx);
        }
        let orphaned: Vec<String> = self
            .graph
            .node_indices()
            .filter(|idx| !reachable.contains(idx))
            .map(|idx| self.graph[idx].to_string())
            .collect();
        if !orphaned.is_empty() {
            return Err(TrackingError::InvalidNetwork(format!(
                "nodes that never reach the root: {}",
                orphaned.join(", ")
            )));
        }

        for idx in self.graph.node_indices() {
            let NetNode::Artifact(artifact) = &self.graph[idx] else {
                continue;
            };
            if artifact.is_concrete() {
                continue;
            }
            let backed = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .any(|pred| match &self.graph[pred] {
                    NetNode::Task(_) => true,
                    NetNode::Artifact(a) => a.is_concrete(),
                    NetNode::Root => false,
                });
            if !backed {
                return Err(TrackingError::InvalidNetwork(format!(
                    "glob artifact {artifact} has no concrete predecessor"
                )));
            }
        }
        Ok(())
    }

    /// Predecessors of a node with the edge labels leading in.
    pub fn dependencies_of(&self, ident: &Ident) -> Vec<(Ident, EdgeKind)> {
        self.adjacent(ident, Direction::Incoming)
    }

    /// Successors of a node with the edge labels leading out. The root is
    /// not reported.
    pub fn dependents_of(&self, ident: &Ident) -> Vec<(Ident, EdgeKind)> {
        self.adjacent(ident, Direction::Outgoing)
    }

    fn adjacent(&self, ident: &Ident, dir: Direction) -> Vec<(Ident, EdgeKind)> {
        let Some(&idx) = self.index.get(&NetNode::from(ident.clone())) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for edge in self.graph.edges_directed(idx, dir) {
            let node = match dir {
                Direction::Incoming => edge.source(),
                Direction::Outgoing => edge.target(),
            };
            match &self.graph[node] {
                NetNode::Root => {}
                NetNode::Task(name) => out.push((Ident::Task(name.clone()), *edge.weight())),
                NetNode::Artifact(a) => out.push((Ident::Artifact(a.clone()), *edge.weight())),
            }
        }
        out
    }

    /// Sorted adjacency summary of one node.
    pub fn concrete_edges(&self, ident: &Ident) -> Result<ConcreteEdges> {
        let node = NetNode::from(ident.clone());
        let Some(&idx) = self.index.get(&node) else {
            return Err(TrackingError::UnknownTask(node.to_string()));
        };
        let mut edges = ConcreteEdges::default();
        for pred in self.graph.neighbors_directed(idx, Direction::Incoming) {
            match &self.graph[pred] {
                NetNode::Root => {}
                NetNode::Task(name) => edges.pred_tasks.push(name.clone()),
                NetNode::Artifact(a) => edges.pred_artifacts.push(a.clone()),
            }
        }
        for succ in self.graph.neighbors_directed(idx, Direction::Outgoing) {
            match &self.graph[succ] {
                NetNode::Root => edges.root = true,
                NetNode::Task(name) => edges.succ_tasks.push(name.clone()),
                NetNode::Artifact(a) => edges.succ_artifacts.push(a.clone()),
            }
        }
        edges.pred_tasks.sort();
        edges.pred_artifacts.sort();
        edges.succ_tasks.sort();
        edges.succ_artifacts.sort();
        Ok(edges)
    }
}

fn ensure_concrete(ident: &Ident) -> Result<()> {
    if !ident.is_concrete() {
        return Err(TrackingError::NotConcrete(ident.to_string()));
    }
    Ok(())
}

/// A dependency edge from a task onto its own cleanup variant is labelled
/// `Cleanup`; everything else is a plain dependency.
fn edge_kind(from: &Ident, to: &Ident) -> EdgeKind {
    let (Ident::Task(from), Ident::Task(to)) = (from, to) else {
        return EdgeKind::Dep;
    };
    if to.is_cleanup() && !from.is_cleanup() && from.base() == to.base() {
        EdgeKind::Cleanup
    } else {
        EdgeKind::Dep
    }
}
