// src/spec/mod.rs

//! Declarative spec model: inert data describing one task template.
//!
//! - [`value`] is the closed sum type used for free-form task parameters.
//! - [`template`] renders `{key}` templates against a parameter map.
//! - [`relation`] describes one dependency/product edge of a spec, with
//!   optional constraints and injection.
//! - [`task_spec`] is the task template itself.

pub mod relation;
pub mod task_spec;
pub mod template;
pub mod value;

pub use relation::{Injection, Relation};
pub use task_spec::{MetaFlag, TaskKind, TaskSpec, CLEANUP_CMD_KEY, CMD_KEY, DEFAULT_PRIORITY};
pub use template::{render_template, render_value};
pub use value::Value;
