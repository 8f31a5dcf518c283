// src/config/loader.rs

use std::path::Path;

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::ConfigError;
use crate::fs::{FileSystem, RealFileSystem};

/// Default pipeline file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Pipedag.toml";

/// Parse a pipeline definition from TOML text without validating it.
pub fn parse_raw(contents: &str) -> Result<RawPipelineFile, ConfigError> {
    Ok(toml::from_str(contents)?)
}

/// Load a pipeline file from a given path and return the raw `RawPipelineFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (DAG correctness, placeholders, etc.). Use [`load_and_validate`]
/// for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPipelineFile, ConfigError> {
    load_from_fs(&RealFileSystem, path.as_ref())
}

pub fn load_from_fs(fs: &dyn FileSystem, path: &Path) -> Result<RawPipelineFile, ConfigError> {
    let contents = fs.read_to_string(path)?;
    parse_raw(&contents)
}

/// Load a pipeline file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - unknown `after` references and unknown default goal,
///   - placeholders that are not task parameters,
///   - bad timeouts and global settings,
///   - cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineFile, ConfigError> {
    let raw = load_from_path(path)?;
    PipelineFile::try_from(raw)
}
