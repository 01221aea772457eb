use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::errors::StorageError;
use crate::storage::Storer;

struct MemorySession {
    value: String,
    expires: Option<Instant>,
}

impl MemorySession {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires, Some(expires) if expires <= now)
    }
}

/// In-memory session storage (no persistence).
///
/// Every session lives for `max_age` after its last `set` or `reset_expiry`.
/// A zero `max_age` keeps sessions until they are deleted. Expired sessions
/// read as missing straight away; their memory is reclaimed by
/// [`remove_expired`](Self::remove_expired), which [`spawn_cleaner`](Self::spawn_cleaner)
/// runs periodically.
#[derive(Default)]
pub struct MemoryStorer {
    sessions: RwLock<HashMap<String, MemorySession>>,
    max_age: Duration,
}

impl MemoryStorer {
    pub fn new(max_age: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Number of stored sessions, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired session and returns how many were removed.
    pub fn remove_expired(&self) -> Result<usize, StorageError> {
        let now = Instant::now();
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok(before - sessions.len())
    }

    /// Spawns a task on the current tokio runtime that calls
    /// [`remove_expired`](Self::remove_expired) every `interval`.
    ///
    /// The task runs until the returned handle is stopped or dropped.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn_cleaner(self: &Arc<Self>, interval: Duration) -> CleanerHandle {
        let cancel = CancellationToken::new();
        let storer = Arc::clone(self);
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match storer.remove_expired() {
                            Ok(0) => {}
                            Ok(n) => log::debug!("memory storer cleaner removed {n} expired session(s)"),
                            Err(e) => log::warn!("memory storer cleaner failed: {e}"),
                        }
                    }
                }
            }
        });

        CleanerHandle { cancel, join: Some(join) }
    }

    fn expiry_from(&self, now: Instant) -> Option<Instant> {
        if self.max_age.is_zero() {
            None
        } else {
            now.checked_add(self.max_age)
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemorySession>>, StorageError> {
        self.sessions
            .read()
            .map_err(|e| StorageError::Backend(anyhow!("failed to acquire read lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemorySession>>, StorageError> {
        self.sessions
            .write()
            .map_err(|e| StorageError::Backend(anyhow!("failed to acquire write lock: {e}")))
    }
}

impl Storer for MemoryStorer {
    fn get(&self, id: &str) -> Result<String, StorageError> {
        let sessions = self.read()?;
        match sessions.get(id) {
            Some(session) if !session.is_expired(Instant::now()) => Ok(session.value.clone()),
            _ => Err(StorageError::NoSession),
        }
    }

    fn set(&self, id: &str, value: &str) -> Result<(), StorageError> {
        let expires = self.expiry_from(Instant::now());
        self.write()?.insert(
            id.to_string(),
            MemorySession {
                value: value.to_string(),
                expires,
            },
        );
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StorageError> {
        match self.write()?.remove(id) {
            Some(session) if !session.is_expired(Instant::now()) => Ok(()),
            _ => Err(StorageError::NoSession),
        }
    }

    fn reset_expiry(&self, id: &str) -> Result<(), StorageError> {
        let now = Instant::now();
        let expires = self.expiry_from(now);
        let mut sessions = self.write()?;
        match sessions.get_mut(id) {
            Some(session) if !session.is_expired(now) => {
                session.expires = expires;
                Ok(())
            }
            _ => Err(StorageError::NoSession),
        }
    }
}

/// Handle to a running [`MemoryStorer`] cleaner task. Dropping it stops the task.
pub struct CleanerHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl CleanerHandle {
    /// Stops the cleaner and waits for the task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                log::warn!("memory storer cleaner ended abnormally: {e}");
            }
        }
    }
}

impl Drop for CleanerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
