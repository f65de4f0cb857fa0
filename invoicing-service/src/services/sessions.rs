//! Registry of live form sessions.
//!
//! Each session sits behind its own async mutex. A request that finds the
//! session busy is rejected instead of queued, so a form can never run two
//! operations at once. Sessions nobody has touched for a while are swept
//! with [`SessionRegistry::evict_idle`].

use crate::error::InvoicingError;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

struct Session<T> {
    cell: Arc<Mutex<T>>,
    touched: Instant,
}

pub struct SessionRegistry<T> {
    sessions: DashMap<Uuid, Session<T>>,
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl<T: Send + 'static> SessionRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and return its id.
    pub fn open(&self, session: T) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            Session {
                cell: Arc::new(Mutex::new(session)),
                touched: Instant::now(),
            },
        );
        id
    }

    fn touch(&self, id: Uuid) -> Option<Arc<Mutex<T>>> {
        let mut entry = self.sessions.get_mut(&id)?;
        entry.touched = Instant::now();
        Some(entry.cell.clone())
    }

    /// Exclusive access to a session, failing fast when another request
    /// holds it. `None` when the id is unknown.
    pub fn acquire(&self, id: Uuid) -> Option<Result<OwnedMutexGuard<T>, InvoicingError>> {
        let cell = self.touch(id)?;
        Some(cell.try_lock_owned().map_err(|_| {
            InvoicingError::InvalidState("Ya hay una operación en curso para este formulario.".to_string())
        }))
    }

    /// Waits for the session instead of failing. For read-only snapshots.
    pub async fn lock(&self, id: Uuid) -> Option<OwnedMutexGuard<T>> {
        let cell = self.touch(id)?;
        Some(cell.lock_owned().await)
    }

    /// Drop a session. Returns `false` when it did not exist.
    pub fn remove(&self, id: Uuid) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Remove sessions idle for at least `ttl` and hand them back locked.
    /// A session held by a running operation is never evicted.
    pub fn evict_idle(&self, ttl: Duration) -> Vec<(Uuid, OwnedMutexGuard<T>)> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.sessions.retain(|id, session| {
            if now.duration_since(session.touched) < ttl {
                return true;
            }
            match session.cell.clone().try_lock_owned() {
                Ok(guard) => {
                    evicted.push((*id, guard));
                    false
                }
                Err(_) => true,
            }
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
