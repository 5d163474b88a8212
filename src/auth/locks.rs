//! Per-account serialisation of session mutations.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per username.
///
/// Entries only live while somebody holds or waits on them; the last guard to
/// drop removes its entry so the map does not grow with every account that
/// ever logged in.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

pub struct UserLockGuard {
    username: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, username: &str) -> UserLockGuard {
        let lock = self
            .locks
            .entry(username.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;

        UserLockGuard {
            username: username.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of usernames with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters clone the Arc under the shard lock, so a count of one means
        // only the map still references this mutex.
        self.locks
            .remove_if(&self.username, |_, lock| Arc::strong_count(lock) == 1);
    }
}
