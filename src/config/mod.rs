// src/config/mod.rs

//! Pipeline definition files.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a pipeline file from disk (`loader.rs`).
//! - Validate dependencies, placeholders and acyclicity (`validate.rs`).
//! - Build the task graph for a goal (`build.rs`).

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::{build_goal, effective_params};
pub use loader::{load_and_validate, load_from_path, parse_raw};
pub use model::{
    ConfigSection, ParamValue, PipelineFile, RawPipelineFile, StoreSection, TaskConfig,
};
