// src/store/filesystem.rs

//! File-backed completion store.
//!
//! A marker maps to a path under the store root. Any URL scheme is dropped,
//! so `s3://bucket/wiki/extract` lives at `<root>/bucket/wiki/extract`; this
//! lets a pipeline written against object-store paths run against a local
//! directory or a mounted bucket. An existing directory counts as a present
//! marker (job outputs are often directories).

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::errors::StoreError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::store::CompletionStore;
use crate::task::Marker;
use crate::types::BoxFuture;

#[derive(Debug, Clone)]
pub struct FsCompletionStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FsCompletionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fs(root, Arc::new(RealFileSystem))
    }

    pub fn with_fs(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the on-disk location of a marker.
    ///
    /// Rejects markers that would escape the root (`..`) or that name no
    /// path at all.
    pub fn path_for(&self, marker: &Marker) -> Result<PathBuf, StoreError> {
        let raw = marker.as_str();
        let stripped = match raw.split_once("://") {
            Some((_scheme, rest)) => rest,
            None => raw,
        };

        let mut path = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(stripped).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    return Err(StoreError::InvalidMarker {
                        marker: raw.to_string(),
                        reason: "parent directory components are not allowed".to_string(),
                    });
                }
            }
        }

        if depth == 0 {
            return Err(StoreError::InvalidMarker {
                marker: raw.to_string(),
                reason: "marker does not name a path".to_string(),
            });
        }

        Ok(path)
    }
}

/// Run a blocking filesystem call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let joined = tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?;
    Ok(joined?)
}

impl CompletionStore for FsCompletionStore {
    fn exists<'a>(&'a self, marker: &'a Marker) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            let path = self.path_for(marker)?;
            let fs = Arc::clone(&self.fs);
            trace!(marker = %marker, ?path, "checking marker");
            let found = blocking(move || fs.try_exists(&path)).await?;
            debug!(marker = %marker, found, "marker check");
            Ok(found)
        })
    }

    fn record<'a>(
        &'a self,
        marker: &'a Marker,
        contents: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let path = self.path_for(marker)?;
            let fs = Arc::clone(&self.fs);
            let bytes = contents.as_bytes().to_vec();
            debug!(marker = %marker, ?path, "writing marker");
            blocking(move || fs.write(&path, &bytes)).await
        })
    }
}
