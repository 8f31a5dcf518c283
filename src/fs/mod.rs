// src/fs/mod.rs

//! Filesystem seam used by the file-backed completion store and the config
//! loader. Tests swap in [`mock::MockFileSystem`].

use std::fmt::Debug;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write `contents`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// `Ok(false)` when the path is absent; `Err` when existence could not
    /// be determined (permissions, IO failure, unreachable mount).
    fn try_exists(&self, path: &Path) -> io::Result<bool>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        // Unique sibling temp file per write, renamed into place.
        let mut tmp = Builder::new().prefix(".pipedag-").tempfile_in(parent)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn try_exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }
}
