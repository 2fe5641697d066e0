use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use uuid::Uuid;

use super::{Session, SessionStatus, StepOutcome};
use crate::config::SessionConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{ArtifactStore, Runtime};

type Slot = Arc<tokio::sync::Mutex<Option<Session>>>;

/// Live sessions keyed by id.
///
/// The map lock is only held to insert, look up or remove a slot. Each
/// slot has its own async lock, held for the duration of a step, so
/// requests for one session are serialized while different sessions step
/// in parallel. A finished session is taken out of its slot before the
/// slot is evicted; a request that was queued on the same slot finds it
/// empty and reports not-found.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Slot>>,
    store: Arc<ArtifactStore>,
    runtime: Arc<dyn Runtime>,
    profiles: SessionConfig,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<ArtifactStore>,
        runtime: Arc<dyn Runtime>,
        profiles: SessionConfig,
        max_sessions: usize,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            store,
            runtime,
            profiles,
            max_sessions,
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, id: &str) -> ServiceResult<Slot> {
        self.map()
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))
    }

    fn evict(&self, id: &str) {
        self.map().remove(id);
    }

    fn check_capacity(&self) -> ServiceResult<()> {
        if self.max_sessions > 0 && self.map().len() >= self.max_sessions {
            return Err(ServiceError::SessionLimit(self.max_sessions));
        }
        Ok(())
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Opens a session for `profile` (the default profile when `None`).
    ///
    /// Extraction and instantiation run on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnknownProfile`], [`ServiceError::SessionLimit`],
    /// or whatever [`Session::open`] reports.
    pub async fn start(&self, requested: Option<&str>) -> ServiceResult<SessionStatus> {
        let (name, profile) = self.profiles.profile(requested).ok_or_else(|| {
            ServiceError::UnknownProfile(requested.unwrap_or_default().to_string())
        })?;
        self.check_capacity()?;

        let id = Uuid::new_v4().to_string();
        let session = {
            let id = id.clone();
            let name = name.to_string();
            let profile = profile.clone();
            let store = Arc::clone(&self.store);
            let runtime = Arc::clone(&self.runtime);
            tokio::task::spawn_blocking(move || {
                Session::open(&id, &name, &profile, &store, runtime.as_ref())
            })
            .await??
        };
        let status = session.status();

        let rejected = {
            let mut map = self.map();
            if self.max_sessions > 0 && map.len() >= self.max_sessions {
                Some(session)
            } else {
                map.insert(id, Arc::new(tokio::sync::Mutex::new(Some(session))));
                None
            }
        };
        if rejected.is_some() {
            release(rejected).await;
            return Err(ServiceError::SessionLimit(self.max_sessions));
        }
        Ok(status)
    }

    /// Steps session `id` with `input_value`.
    ///
    /// A `done` outcome or a runtime error releases the session before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] for unknown or already
    /// released sessions, or the runtime error that ended the session.
    pub async fn step(&self, id: &str, input_value: f64) -> ServiceResult<StepOutcome> {
        let slot = self.slot(id)?;
        let mut guard = slot.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))?;

        match session.step(input_value) {
            Ok(outcome) => {
                if outcome.done {
                    let finished = guard.take();
                    self.evict(id);
                    drop(guard);
                    release(finished).await;
                    info!(session = id, time = outcome.time, "session done");
                }
                Ok(outcome)
            }
            Err(e) => {
                let failed = guard.take();
                self.evict(id);
                drop(guard);
                release(failed).await;
                warn!(session = id, error = %e, "step failed, session released");
                Err(e.into())
            }
        }
    }

    /// Current state of session `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if there is no such session.
    pub async fn status(&self, id: &str) -> ServiceResult<SessionStatus> {
        let slot = self.slot(id)?;
        let guard = slot.lock().await;
        guard
            .as_ref()
            .map(Session::status)
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))
    }

    /// Releases session `id` early and returns its final state.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if there is no such session.
    pub async fn stop(&self, id: &str) -> ServiceResult<SessionStatus> {
        let slot = self
            .map()
            .remove(id)
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))?;
        let session = slot
            .lock()
            .await
            .take()
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))?;
        let status = session.status();
        release(Some(session)).await;
        info!(session = id, "session stopped");
        Ok(status)
    }

    /// Ids of all live sessions, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.map().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Releases every session. Used on shutdown.
    pub async fn clear(&self) {
        let slots: Vec<(String, Slot)> = self.map().drain().collect();
        let count = slots.len();
        for (_, slot) in slots {
            let session = slot.lock().await.take();
            release(session).await;
        }
        if count > 0 {
            info!(count, "released sessions on shutdown");
        }
    }
}

/// Drops `session` on the blocking pool, waiting until its instance is
/// terminated and its extraction removed.
async fn release(session: Option<Session>) {
    if let Some(session) = session {
        if let Err(e) = tokio::task::spawn_blocking(move || drop(session)).await {
            warn!(error = %e, "session release did not complete");
        }
    }
}
