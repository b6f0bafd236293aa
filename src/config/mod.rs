// src/config/mod.rs

//! Configuration loading and validation.
//!
//! [`model`] mirrors the TOML shape, [`validate`] turns the raw form into
//! a [`model::ConfigFile`] of ready-to-register specs, and [`loader`] ties
//! the two together behind [`loader::load_and_validate`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, RawRelation, RawTaskConfig};
