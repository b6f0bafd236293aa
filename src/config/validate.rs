// src/config/validate.rs

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, RawRelation, RawTaskConfig};
use crate::errors::{Result, TrackingError};
use crate::ident::{Ident, TaskArtifact, TaskName};
use crate::spec::{Injection, MetaFlag, Relation, TaskSpec};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TrackingError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let specs = build_specs(&raw)?;
        validate_references(&specs)?;
        validate_dag(&specs)?;
        Ok(ConfigFile::new_unchecked(raw.config, specs))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TrackingError::ConfigError(
            "config must contain at least one [task.\"group::name\"] section".to_string(),
        ));
    }
    Ok(())
}

fn build_specs(cfg: &RawConfigFile) -> Result<Vec<TaskSpec>> {
    let mut specs = Vec::with_capacity(cfg.task.len());
    for (key, task) in cfg.task.iter() {
        specs.push(build_spec(key, task)?);
    }
    Ok(specs)
}

fn build_spec(key: &str, task: &RawTaskConfig) -> Result<TaskSpec> {
    let name = TaskName::from_str(key)?;
    if name.is_concrete() || name.is_head() || name.is_cleanup() {
        return Err(TrackingError::ConfigError(format!(
            "task name '{key}' uses a reserved marker; markers are assigned by the tracker"
        )));
    }

    let mut spec = TaskSpec::new(name);
    for source in &task.sources {
        let source = TaskName::from_str(source)?;
        if source.is_concrete() {
            return Err(TrackingError::ConfigError(format!(
                "task '{key}' lists a concrete name in `sources`"
            )));
        }
        spec.sources.push(source);
    }
    for rel in &task.depends_on {
        spec.depends_on.push(build_relation(key, rel)?);
    }
    for rel in &task.required_for {
        spec.required_for.push(build_relation(key, rel)?);
    }
    for rel in &task.cleanup {
        spec.cleanup.push(build_relation(key, rel)?);
    }
    spec.kind = task.kind;
    if task.disabled {
        spec.meta.insert(MetaFlag::Disabled);
    }
    spec.extra = task.extra.clone();
    spec.must_inject = task.must_inject.clone();
    spec.priority = task.priority;
    Ok(spec)
}

fn build_relation(key: &str, rel: &RawRelation) -> Result<Relation> {
    match rel {
        RawRelation::Target(s) => {
            let target = Ident::from_str(s)?;
            Ok(Relation {
                target,
                constraints: Vec::new(),
                injection: None,
            })
        }
        RawRelation::Detailed {
            task,
            file,
            constraints,
            inject,
        } => {
            let target = match (task, file) {
                (Some(task), None) => Ident::Task(TaskName::from_str(task)?),
                (None, Some(file)) => Ident::Artifact(TaskArtifact::from_str(file)?),
                _ => {
                    return Err(TrackingError::ConfigError(format!(
                        "relation of task '{key}' must set exactly one of `task` or `file`"
                    )));
                }
            };
            if matches!(target, Ident::Artifact(_)) && (!constraints.is_empty() || !inject.is_empty())
            {
                return Err(TrackingError::ConfigError(format!(
                    "relation of task '{key}' puts constraints or injections on a file target"
                )));
            }
            let injection = if inject.is_empty() {
                None
            } else {
                Some(Injection::new(inject.clone()))
            };
            Ok(Relation {
                target,
                constraints: constraints.clone(),
                injection,
            })
        }
    }
}

fn validate_references(specs: &[TaskSpec]) -> Result<()> {
    let declared: HashSet<&TaskName> = specs.iter().map(|spec| &spec.name).collect();

    for spec in specs {
        for source in &spec.sources {
            if !declared.contains(&source.base()) {
                return Err(TrackingError::ConfigError(format!(
                    "task '{}' has unknown source '{}'",
                    spec.name, source
                )));
            }
        }
        let relations = spec
            .depends_on
            .iter()
            .chain(spec.required_for.iter())
            .chain(spec.cleanup.iter());
        for rel in relations {
            let Ident::Task(target) = &rel.target else {
                continue;
            };
            if target.is_concrete() {
                return Err(TrackingError::ConfigError(format!(
                    "task '{}' references the concrete name '{}'",
                    spec.name, target
                )));
            }
            if *target == spec.name {
                return Err(TrackingError::ConfigError(format!(
                    "task '{}' cannot relate to itself",
                    spec.name
                )));
            }
            if !declared.contains(&target.base()) {
                return Err(TrackingError::ConfigError(format!(
                    "task '{}' has unknown relation target '{}'",
                    spec.name, target
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(specs: &[TaskSpec]) -> Result<()> {
    // Build a simple petgraph graph over declared names, ignoring markers:
    // a relation to a head or cleanup variant still orders the declared
    // specs. Artifact relations are left to the runtime network check.
    //
    // Edge direction: dep -> task.
    let names: Vec<String> = specs.iter().map(|spec| spec.name.to_string()).collect();
    let index: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for i in 0..names.len() {
        graph.add_node(i);
    }

    for (i, spec) in specs.iter().enumerate() {
        for rel in &spec.depends_on {
            if let Ident::Task(target) = &rel.target {
                if let Some(&j) = index.get(target.base().to_string().as_str()) {
                    graph.add_edge(j, i, ());
                }
            }
        }
        for rel in &spec.required_for {
            if let Ident::Task(target) = &rel.target {
                if let Some(&j) = index.get(target.base().to_string().as_str()) {
                    graph.add_edge(i, j, ());
                }
            }
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TrackingError::NetworkCycle(names[cycle.node_id()].clone())),
    }
}
