// src/spec/relation.rs

use std::collections::BTreeMap;

use crate::errors::Result;
use crate::ident::{Ident, TaskArtifact, TaskName};
use crate::spec::task_spec::TaskSpec;
use crate::spec::template::render_value;
use crate::spec::value::Value;

/// One edge of a task spec: something the task needs or something it
/// produces, depending on which group of the spec it sits in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub target: Ident,
    /// Parameter keys that must agree between the relating specs before an
    /// existing instance may satisfy this relation.
    pub constraints: Vec<String>,
    pub injection: Option<Injection>,
}

impl Relation {
    pub fn task(name: TaskName) -> Self {
        Relation {
            target: Ident::Task(name),
            constraints: Vec::new(),
            injection: None,
        }
    }

    pub fn artifact(artifact: TaskArtifact) -> Self {
        Relation {
            target: Ident::Artifact(artifact),
            constraints: Vec::new(),
            injection: None,
        }
    }

    pub fn with_constraints(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.constraints = keys.into_iter().collect();
        self
    }

    pub fn with_injection(mut self, injection: Injection) -> Self {
        self.injection = Some(injection);
        self
    }

    /// Whether an existing concrete instance may stand in for this
    /// relation's target when `control` is the spec that carries it.
    ///
    /// The candidate must derive from the target name, agree with the
    /// control spec on every constraint key the control spec defines, and
    /// already hold the values this relation would inject. A constraint key
    /// absent from the control spec is vacuous; one absent from the
    /// candidate rejects it.
    pub fn accepts(&self, control: &TaskSpec, candidate: &TaskSpec) -> bool {
        let Ident::Task(target) = &self.target else {
            return false;
        };
        if !candidate.name.is_concrete() || !candidate.name.derives_from(target) {
            return false;
        }
        for key in &self.constraints {
            match (control.extra.get(key), candidate.extra.get(key)) {
                (None, _) => continue,
                (Some(_), None) => return false,
                (Some(ours), Some(theirs)) if ours != theirs => return false,
                _ => continue,
            }
        }
        if let Some(injection) = &self.injection {
            let Ok(rendered) = injection.render(&control.extra) else {
                return false;
            };
            for (key, value) in &rendered {
                if candidate.extra.get(key) != Some(value) {
                    return false;
                }
            }
        }
        true
    }
}

/// Parameter flow across a relation: each entry is a key to set on the
/// target spec and a template rendered against the control spec's
/// parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Injection {
    pub mapping: BTreeMap<String, String>,
}

impl Injection {
    pub fn new(mapping: BTreeMap<String, String>) -> Self {
        Injection { mapping }
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Renders every template against `params`, producing the values to
    /// write into the target spec.
    pub fn render(&self, params: &BTreeMap<String, Value>) -> Result<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        for (key, template) in &self.mapping {
            out.insert(key.clone(), render_value(template, params)?);
        }
        Ok(out)
    }
}
