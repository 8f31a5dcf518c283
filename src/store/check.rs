// src/store/check.rs

//! Completion checks with bounded retries.
//!
//! This is the only place where the engine retries anything: a transient
//! store failure is retried up to `attempts` times with linear backoff, then
//! surfaced as [`PipelineError::CompletionCheck`]. An unanswered check is
//! never read as "present" or "absent".

use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{PipelineError, Result};
use crate::store::CompletionStore;
use crate::task::Marker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckPolicy {
    /// Total attempts per marker lookup, including the first. Minimum 1.
    pub attempts: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for CheckPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

impl CheckPolicy {
    /// Fail on the first transient error.
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Check a single marker, retrying transient failures per `policy`.
pub async fn marker_exists(
    store: &dyn CompletionStore,
    marker: &Marker,
    policy: &CheckPolicy,
) -> Result<bool> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match store.exists(marker).await {
            Ok(found) => return Ok(found),
            Err(err) if err.is_transient() && attempt < attempts => {
                warn!(
                    marker = %marker,
                    attempt,
                    attempts,
                    error = %err,
                    "transient completion check failure; retrying"
                );
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(source) => {
                return Err(PipelineError::CompletionCheck {
                    marker: marker.clone(),
                    source,
                });
            }
        }
    }
}

/// Markers from `markers` that do not exist, in input order.
pub async fn missing_markers(
    store: &dyn CompletionStore,
    markers: &[Marker],
    policy: &CheckPolicy,
) -> Result<Vec<Marker>> {
    let mut missing = Vec::new();
    for marker in markers {
        if !marker_exists(store, marker, policy).await? {
            missing.push(marker.clone());
        }
    }
    Ok(missing)
}

/// A task is complete iff it has markers and every one of them exists.
///
/// Stops at the first missing marker.
pub async fn is_complete(
    store: &dyn CompletionStore,
    markers: &[Marker],
    policy: &CheckPolicy,
) -> Result<bool> {
    if markers.is_empty() {
        return Ok(false);
    }
    for marker in markers {
        if !marker_exists(store, marker, policy).await? {
            debug!(marker = %marker, "marker missing");
            return Ok(false);
        }
    }
    Ok(true)
}
