//! In-memory session store keyed by session id
//!
//! Reads never create a session; only generation actions do. Sessions that
//! stay idle longer than the configured limit are removed whole by a
//! background sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

use super::SessionState;

/// Held while a generation for a session is in flight
pub type GenerationGuard = OwnedMutexGuard<()>;

struct Session {
    state: RwLock<SessionState>,
    generation: Arc<Mutex<()>>,
    last_seen: SyncMutex<Instant>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: RwLock::new(SessionState::new()),
            generation: Arc::new(Mutex::new(())),
            last_seen: SyncMutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    fn is_generating(&self) -> bool {
        self.generation.try_lock().is_err()
    }
}

/// Store for all sessions of the running process
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the session's state if it does not exist yet
    ///
    /// Safe to call repeatedly; existing state is left untouched.
    pub fn initialize(&self, id: Uuid) {
        self.session(id);
    }

    fn session(&self, id: Uuid) -> Arc<Session> {
        if let Some(session) = self.existing(id) {
            return session;
        }

        self.sessions
            .write()
            .entry(id)
            .or_insert_with(|| {
                debug!("Initialized session {}", id);
                Arc::new(Session::new())
            })
            .clone()
    }

    fn existing(&self, id: Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.read().get(&id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Copy of the session's current state
    ///
    /// Unknown sessions read as empty and are not created.
    pub fn snapshot(&self, id: Uuid) -> SessionState {
        self.existing(id)
            .map(|session| session.state.read().clone())
            .unwrap_or_default()
    }

    /// Mutate the session's state
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let session = self.session(id);
        let mut state = session.state.write();
        f(&mut state)
    }

    /// Claim the session for a generation, creating it if needed
    ///
    /// Returns `None` if another generation for this session is in flight.
    pub fn begin_generation(&self, id: Uuid) -> Option<GenerationGuard> {
        self.session(id).generation.clone().try_lock_owned().ok()
    }

    /// Remove sessions unseen for longer than `max_idle`
    ///
    /// Sessions with a generation in flight are kept. Returns how many were
    /// removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.is_generating() || session.idle_for() <= max_idle;
            if !keep {
                debug!("Evicting idle session {}", id);
            }
            keep
        });
        before - sessions.len()
    }

    /// Periodically evict idle sessions until shutdown is signalled
    pub async fn run_sweeper(
        self: Arc<Self>,
        max_idle: Duration,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = self.evict_idle(max_idle);
                    if removed > 0 {
                        info!("Evicted {} idle sessions, {} remain", removed, self.len());
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Session sweeper stopped");
    }

    /// Number of known sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
