//! In-flight execution registry.
//!
//! Tracks which jobs this processor instance is currently executing, keyed
//! by job id, each with its own cancellation token. The registry is owned
//! by the processor instance; nothing here is global state.

use std::collections::HashMap;
use std::sync::Mutex;
use tagflow_core::{JobId, OwnerId};
use tokio_util::sync::CancellationToken;

struct Entry {
    owner: OwnerId,
    token: CancellationToken,
}

/// Per-processor map of executing jobs and their cancellation tokens.
#[derive(Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<JobId, Entry>>,
}

impl InFlightRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job for execution.
    ///
    /// Returns the job's fresh cancellation token, or `None` if the job is
    /// already in flight (double-admission guard).
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn register(&self, job_id: JobId, owner: OwnerId) -> Option<CancellationToken> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        if entries.contains_key(&job_id) {
            return None;
        }
        let token = CancellationToken::new();
        entries.insert(
            job_id,
            Entry {
                owner,
                token: token.clone(),
            },
        );
        Some(token)
    }

    /// Remove a job from the registry. Called on every execution exit path.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn deregister(&self, job_id: &JobId) {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .remove(job_id);
    }

    /// Signal cancellation of an in-flight job.
    ///
    /// Returns false if the job is not executing in this processor instance;
    /// cross-process cancellation goes through the persisted flag instead.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let entries = self.entries.lock().expect("registry lock poisoned");
        if let Some(entry) = entries.get(job_id) {
            entry.token.cancel();
            true
        } else {
            false
        }
    }

    /// Number of jobs executing for one owner scope.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn in_flight(&self, owner: &OwnerId) -> usize {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .values()
            .filter(|entry| &entry.owner == owner)
            .count()
    }

    /// Total number of jobs executing across all owners.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.lock().expect("registry lock poisoned").len()
    }
}
