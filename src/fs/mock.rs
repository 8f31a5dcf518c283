use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::FileSystem;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Paths whose existence checks fail with an IO error.
    unreachable: HashSet<PathBuf>,
    /// When set, every write fails.
    read_only: bool,
}

/// In-memory filesystem with fault injection.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();

        // Ensure parent directories exist implicitly for simplicity in this mock
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir.as_os_str().is_empty() {
                break;
            }
            state.entries.entry(dir.to_path_buf()).or_insert(MockEntry::Dir);
            parent = dir.parent();
        }

        state.entries.insert(path, MockEntry::File(content.into()));
    }

    /// Make existence checks for `path` fail until [`MockFileSystem::restore`].
    pub fn make_unreachable(&self, path: impl AsRef<Path>) {
        self.lock().unreachable.insert(path.as_ref().to_path_buf());
    }

    pub fn restore(&self, path: impl AsRef<Path>) {
        self.lock().unreachable.remove(path.as_ref());
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.lock().read_only = read_only;
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File(content)) => String::from_utf8(content.clone())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Some(MockEntry::Dir) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {:?}", path),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if self.lock().read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("mock filesystem is read-only: {:?}", path),
            ));
        }
        self.add_file(path, contents);
        Ok(())
    }

    fn try_exists(&self, path: &Path) -> io::Result<bool> {
        let state = self.lock();
        if state.unreachable.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("simulated backend outage for {:?}", path),
            ));
        }
        Ok(state.entries.contains_key(path))
    }
}
