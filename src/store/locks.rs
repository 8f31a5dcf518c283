use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::task::Marker;

type LockTable = HashMap<Marker, Arc<AsyncMutex<()>>>;

/// Per-marker mutual exclusion.
///
/// A task holds the locks for all of its markers while it runs and writes
/// them, so two concurrent writers never produce the same marker. Entries
/// live only while some task holds or waits for them.
#[derive(Debug, Clone, Default)]
pub struct MarkerLocks {
    table: Arc<Mutex<LockTable>>,
}

/// Holds a set of marker locks until dropped.
#[derive(Debug)]
pub struct MarkerGuard {
    guards: Vec<OwnedMutexGuard<()>>,
    markers: Vec<Marker>,
    table: Arc<Mutex<LockTable>>,
}

fn lock_table(table: &Mutex<LockTable>) -> MutexGuard<'_, LockTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MarkerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every marker in `markers`.
    ///
    /// Locks are taken in sorted order so two tasks with overlapping markers
    /// cannot deadlock.
    pub async fn acquire(&self, markers: &[Marker]) -> MarkerGuard {
        let mut sorted = markers.to_vec();
        sorted.sort();
        sorted.dedup();

        let locks: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = lock_table(&self.table);
            sorted
                .iter()
                .map(|marker| Arc::clone(table.entry(marker.clone()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(locks.len());
        for lock in locks {
            guards.push(lock.lock_owned().await);
        }

        MarkerGuard {
            guards,
            markers: sorted,
            table: Arc::clone(&self.table),
        }
    }

    /// Number of markers currently locked or waited on.
    pub fn len(&self) -> usize {
        lock_table(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for MarkerGuard {
    fn drop(&mut self) {
        self.guards.clear();

        // The table's own reference is the last one once nobody holds or
        // waits for the lock.
        let mut table = lock_table(&self.table);
        for marker in &self.markers {
            if table
                .get(marker)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                table.remove(marker);
            }
        }
    }
}
