use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pipedag::errors::StoreError;
use pipedag::store::{CompletionStore, MemoryCompletionStore};
use pipedag::task::Marker;
use pipedag::types::BoxFuture;

/// Completion store wrapper that injects faults into a
/// [`MemoryCompletionStore`].
///
/// - `fail_checks(marker, n)` makes the next `n` lookups of `marker` fail
///   with a transient error.
/// - `drop_writes(true)` acknowledges writes without storing anything.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: MemoryCompletionStore,
    failures: Arc<Mutex<HashMap<Marker, usize>>>,
    checks: Arc<Mutex<HashMap<Marker, usize>>>,
    drop_writes: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new(inner: MemoryCompletionStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryCompletionStore {
        &self.inner
    }

    pub fn fail_checks(&self, marker: &str, times: usize) {
        lock(&self.failures).insert(Marker::from(marker), times);
    }

    pub fn drop_writes(&self, drop: bool) {
        self.drop_writes.store(drop, Ordering::SeqCst);
    }

    /// Number of `exists` calls made for `marker`, failed ones included.
    pub fn check_count(&self, marker: &str) -> usize {
        lock(&self.checks)
            .get(&Marker::from(marker))
            .copied()
            .unwrap_or(0)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CompletionStore for FlakyStore {
    fn exists<'a>(&'a self, marker: &'a Marker) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            *lock(&self.checks).entry(marker.clone()).or_insert(0) += 1;

            let fail = {
                let mut failures = lock(&self.failures);
                match failures.get_mut(marker) {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        true
                    }
                    _ => false,
                }
            };
            if fail {
                return Err(StoreError::Transient(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("simulated outage checking {marker}"),
                )));
            }

            self.inner.exists(marker).await
        })
    }

    fn record<'a>(
        &'a self,
        marker: &'a Marker,
        contents: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            if self.drop_writes.load(Ordering::SeqCst) {
                return Ok(());
            }
            self.inner.record(marker, contents).await
        })
    }
}
