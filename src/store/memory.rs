use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::StoreError;
use crate::store::CompletionStore;
use crate::task::Marker;
use crate::types::BoxFuture;

/// Process-local completion store. Cloning shares the underlying set.
#[derive(Debug, Clone, Default)]
pub struct MemoryCompletionStore {
    markers: Arc<Mutex<BTreeMap<Marker, String>>>,
}

impl MemoryCompletionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markers<I, M>(markers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Marker>,
    {
        let store = Self::new();
        {
            let mut guard = store.lock();
            for marker in markers {
                guard.insert(marker.into(), String::new());
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Marker, String>> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, marker: &Marker) -> bool {
        self.lock().contains_key(marker)
    }

    pub fn contents(&self, marker: &Marker) -> Option<String> {
        self.lock().get(marker).cloned()
    }

    /// All recorded markers, sorted.
    pub fn markers(&self) -> Vec<Marker> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl CompletionStore for MemoryCompletionStore {
    fn exists<'a>(&'a self, marker: &'a Marker) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move { Ok(self.contains(marker)) })
    }

    fn record<'a>(
        &'a self,
        marker: &'a Marker,
        contents: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.lock().insert(marker.clone(), contents.to_string());
            Ok(())
        })
    }
}
