//! Pooled remote sessions
//!
//! A [`SessionPool`] owns a set of live read-only sessions for one
//! host/credential pair and hands them out one borrower at a time. Borrow
//! waits are bounded; return happens in the guard's `Drop`, so a session
//! goes back to the pool on success, decode failure, I/O error, task
//! timeout or panic alike.
//!
//! Between folders of the same site analysis, idle sessions are parked in
//! a process-wide cache keyed by [`PoolKey`] so the next batch can skip
//! most of the session-setup cost. The cache mutex guards only
//! lookup/insert/remove; sessions are health-checked and used outside it.
//! Entries are removed when the owning site analysis completes.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::transport::{RemoteSession, SessionFactory};

/// Identity of a reusable pool: one pool per (session, host, port, user).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub session_id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{} ({})",
            self.username, self.host, self.port, self.session_id
        )
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("session pool too small: {live} live sessions (minimum {minimum})")]
    TooSmall { live: usize, minimum: usize },

    #[error("timed out waiting for a pooled session after {0:?}")]
    BorrowTimeout(Duration),

    #[error("session pool is closed")]
    Closed,
}

/// A fixed-size pool of live sessions with a checkout/checkin discipline.
pub struct SessionPool {
    key: PoolKey,
    size: usize,
    idle: Mutex<VecDeque<Box<dyn RemoteSession>>>,
    available: Semaphore,
    degraded: AtomicBool,
}

impl fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("degraded", &self.degraded)
            .finish_non_exhaustive()
    }
}

impl SessionPool {
    /// Wrap an already-opened session set. Callers enforce the minimum
    /// viable size before building a pool.
    pub fn new(key: PoolKey, sessions: Vec<Box<dyn RemoteSession>>) -> Arc<Self> {
        let size = sessions.len();
        Arc::new(Self {
            key,
            size,
            idle: Mutex::new(sessions.into()),
            available: Semaphore::new(size),
            degraded: AtomicBool::new(false),
        })
    }

    /// Build a pool of `desired` sessions, reusing `seed` sessions first
    /// and opening the rest through the factory. Opening stops at the
    /// first failure (natural shrink); fewer than `minimum` live sessions
    /// closes everything and reports [`PoolError::TooSmall`] so the caller
    /// can degrade to sequential processing.
    pub async fn create(
        key: PoolKey,
        factory: &dyn SessionFactory,
        seed: Vec<Box<dyn RemoteSession>>,
        desired: usize,
        minimum: usize,
    ) -> Result<Arc<Self>, PoolError> {
        let mut sessions = seed;
        sessions.reserve(desired.saturating_sub(sessions.len()));
        for i in sessions.len()..desired {
            match factory.open_session().await {
                Ok(session) => {
                    tracing::debug!("Opened pool session {}/{} for {}", i + 1, desired, key);
                    sessions.push(session);
                }
                Err(e) => {
                    tracing::error!("Failed to open pool session {}/{}: {}", i + 1, desired, e);
                    break;
                }
            }
        }
        if sessions.len() < minimum {
            let live = sessions.len();
            drop(sessions);
            return Err(PoolError::TooSmall { live, minimum });
        }
        tracing::info!("Session pool ready ({} sessions) for {}", sessions.len(), key);
        Ok(Self::new(key, sessions))
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Number of sessions the pool was built with.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Borrow a session, waiting at most `timeout` for one to come back.
    /// Concurrent borrowers never exceed the pool size by scheduler
    /// design, so the wait only triggers under contention.
    pub async fn borrow(
        self: &Arc<Self>,
        timeout: Duration,
    ) -> Result<PooledSession, PoolError> {
        let permit = tokio::time::timeout(timeout, self.available.acquire())
            .await
            .map_err(|_| PoolError::BorrowTimeout(timeout))?
            .map_err(|_| PoolError::Closed)?;
        permit.forget();

        let session = self
            .idle
            .lock()
            .expect("pool mutex poisoned")
            .pop_front();
        match session {
            Some(session) => Ok(PooledSession {
                pool: Arc::clone(self),
                session: Some(session),
            }),
            None => Err(PoolError::Closed),
        }
    }

    /// Mark the pool unfit for reuse (e.g. after a batch timeout abandoned
    /// tasks mid-read). Degraded pools are closed instead of cached.
    pub fn mark_degraded(&self) {
        self.degraded.store(true, Ordering::SeqCst);
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Close every idle session and refuse further borrows.
    pub fn close_all(&self) {
        self.available.close();
        if let Ok(mut idle) = self.idle.lock() {
            let n = idle.len();
            idle.clear();
            if n > 0 {
                tracing::debug!("Closed {} pooled sessions for {}", n, self.key);
            }
        }
    }

    /// Take back the idle sessions once all borrowers are done, consuming
    /// the pool.
    pub fn reclaim(self: Arc<Self>) -> Vec<Box<dyn RemoteSession>> {
        match Arc::try_unwrap(self) {
            Ok(pool) => pool
                .idle
                .into_inner()
                .map(Vec::from)
                .unwrap_or_default(),
            Err(pool) => {
                // A straggler still holds the Arc; drain what is idle now.
                let mut idle = pool.idle.lock().expect("pool mutex poisoned");
                idle.drain(..).collect()
            }
        }
    }
}

/// Borrowed session handle. Returns its session to the pool on drop.
pub struct PooledSession {
    pool: Arc<SessionPool>,
    session: Option<Box<dyn RemoteSession>>,
}

impl fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("pool", self.pool.key())
            .finish_non_exhaustive()
    }
}

impl PooledSession {
    pub fn session(&self) -> &dyn RemoteSession {
        self.session
            .as_deref()
            .expect("session present until drop")
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Ok(mut idle) = self.pool.idle.lock() {
                idle.push_back(session);
                self.pool.available.add_permits(1);
            }
        }
    }
}

// Process-wide cache of idle session sets, keyed by PoolKey. Explicit
// lifecycle: inserted when a batch finishes, removed (and closed) when the
// owning site analysis completes or the connection disconnects.
static POOL_CACHE: Lazy<Mutex<HashMap<PoolKey, Vec<Box<dyn RemoteSession>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Remove and return any cached sessions for this key. Health checking is
/// the caller's job and happens outside the cache lock.
pub fn take_cached(key: &PoolKey) -> Vec<Box<dyn RemoteSession>> {
    POOL_CACHE
        .lock()
        .expect("pool cache mutex poisoned")
        .remove(key)
        .unwrap_or_default()
}

/// Park idle sessions for reuse by the next folder of the same analysis.
pub fn cache_sessions(key: PoolKey, sessions: Vec<Box<dyn RemoteSession>>) {
    if sessions.is_empty() {
        return;
    }
    tracing::debug!("Cached {} sessions for {}", sessions.len(), key);
    POOL_CACHE
        .lock()
        .expect("pool cache mutex poisoned")
        .insert(key, sessions);
}

/// Drop every cached session belonging to a connection session id.
/// Returns how many sessions were closed.
pub fn cleanup_for_session(session_id: &str) -> usize {
    let removed: Vec<Vec<Box<dyn RemoteSession>>> = {
        let mut cache = POOL_CACHE.lock().expect("pool cache mutex poisoned");
        let keys: Vec<PoolKey> = cache
            .keys()
            .filter(|k| k.session_id == session_id)
            .cloned()
            .collect();
        keys.into_iter().filter_map(|k| cache.remove(&k)).collect()
    };
    let count = removed.iter().map(Vec::len).sum();
    if count > 0 {
        tracing::info!("Closed {} cached sessions for session {}", count, session_id);
    }
    count
}
