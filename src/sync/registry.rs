//! Sync-task registry — at most one active sync pass per account.
//!
//! A process-wide, mutex-guarded map keyed by account address. The lock is
//! held across the already-running check and the insert, so two
//! near-simultaneous registrations for the same account cannot both start a
//! pass. Entries remove themselves when the pass future completes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to one in-flight sync pass.
struct SyncHandle {
    cancel: Arc<AtomicBool>,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

/// Registry of in-flight sync passes, keyed by account address.
///
/// The map lives behind its own `Arc` so completed passes can deregister
/// themselves from their spawned wrapper task.
pub struct SyncRegistry {
    tasks: Arc<Mutex<HashMap<String, SyncHandle>>>,
}

impl SyncRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Start a pass for `key` unless one is already registered.
    ///
    /// Returns `true` if a new pass was spawned. The factory receives the
    /// pass's cancellation flag; the spawned task removes its own registry
    /// entry when the future finishes.
    pub fn get_or_start<F>(&self, key: &str, start: F) -> bool
    where
        F: FnOnce(Arc<AtomicBool>) -> BoxFuture<'static, ()>,
    {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains_key(key) {
            debug!(account = key, "Sync already active; not starting another");
            return false;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let fut = start(Arc::clone(&cancel));

        let map = Arc::clone(&self.tasks);
        let entry_key = key.to_string();
        let handle = tokio::spawn(async move {
            fut.await;
            map.lock().unwrap().remove(&entry_key);
            debug!(account = %entry_key, "Sync pass deregistered");
        });

        tasks.insert(key.to_string(), SyncHandle { cancel, handle });
        true
    }

    /// Whether a pass is currently registered for `key`.
    pub fn is_active(&self, key: &str) -> bool {
        self.tasks.lock().unwrap().contains_key(key)
    }

    /// Account addresses with an in-flight pass.
    pub fn active(&self) -> Vec<String> {
        self.tasks.lock().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal every in-flight pass to stop. Passes check the flag between
    /// messages; in-flight per-message work is allowed to finish. Detached
    /// notification tasks are simply abandoned.
    pub fn shutdown(&self) {
        let tasks = self.tasks.lock().unwrap();
        for (key, entry) in tasks.iter() {
            entry.cancel.store(true, Ordering::Relaxed);
            info!(account = %key, "Cancellation signalled to sync pass");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
