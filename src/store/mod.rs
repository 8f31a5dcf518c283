// src/store/mod.rs

//! Completion stores: durable marker existence.
//!
//! - [`CompletionStore`] is the seam; backends never cache, every check
//!   queries the backing medium.
//! - [`filesystem`] maps markers to files under a root directory.
//! - [`memory`] keeps markers in a process-local set.
//! - [`check`] wraps lookups with the retry policy for transient failures.
//! - [`locks`] serializes checks and writes per marker.

pub mod check;
pub mod filesystem;
pub mod locks;
pub mod memory;

use std::fmt::Debug;

use crate::errors::StoreError;
use crate::task::Marker;
use crate::types::BoxFuture;

pub use check::CheckPolicy;
pub use filesystem::FsCompletionStore;
pub use locks::{MarkerGuard, MarkerLocks};
pub use memory::MemoryCompletionStore;

/// Durable mapping from [`Marker`] to existence.
pub trait CompletionStore: Send + Sync + Debug {
    /// `Ok(false)` for "not found". Backend failures must surface as
    /// [`StoreError::Transient`] rather than being folded into `false`.
    fn exists<'a>(&'a self, marker: &'a Marker) -> BoxFuture<'a, Result<bool, StoreError>>;

    /// Durably create `marker`. Rewriting an existing marker is allowed.
    fn record<'a>(
        &'a self,
        marker: &'a Marker,
        contents: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}
