//! Shared holder for the latest queue snapshot.

use std::sync::Arc;

use fedbot_core::{RefreshFailurePolicy, Snapshot};
use tokio::sync::{Mutex, MutexGuard, RwLock};

#[derive(Debug, Default)]
struct State {
    snapshot: Option<Arc<Snapshot>>,
    stale: bool,
}

/// Latest snapshot plus whether the refresh after it failed.
/// Readers get an `Arc` and evaluate without holding the lock. A reader
/// arriving while a refresh is in flight waits for it to land.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    state: RwLock<State>,
    refresh: Mutex<()>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold for the duration of a refresh, fetch included.
    pub async fn begin_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }

    /// Replace the snapshot wholesale and clear the stale flag.
    pub async fn replace(&self, snapshot: Snapshot) {
        let mut state = self.state.write().await;
        state.snapshot = Some(Arc::new(snapshot));
        state.stale = false;
    }

    /// Mark the held snapshot as outdated after a failed refresh.
    pub async fn mark_stale(&self) {
        self.state.write().await.stale = true;
    }

    pub async fn is_stale(&self) -> bool {
        self.state.read().await.stale
    }

    /// Snapshot rules should evaluate, or `None` to skip this run.
    pub async fn current(&self, policy: RefreshFailurePolicy) -> Option<Arc<Snapshot>> {
        drop(self.refresh.lock().await);
        let state = self.state.read().await;
        match (&state.snapshot, state.stale, policy) {
            (None, _, _) => None,
            (Some(_), true, RefreshFailurePolicy::Skip) => None,
            (Some(s), _, _) => Some(Arc::clone(s)),
        }
    }
}
