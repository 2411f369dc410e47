use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::model::Session;
use super::store::{MemorySessionStore, SessionStore};
use crate::error::ClientError;

/// Owner of the current session.
///
/// Shared between every call site through an `Arc`. The in-memory copy is the
/// source of truth; each mutation is written through to the [`SessionStore`].
/// Locks are never held across an `.await`.
pub struct SessionService {
    current: RwLock<Option<Session>>,
    store: Arc<dyn SessionStore>,
}

impl SessionService {
    /// Rehydrate from `store`. A store that cannot be read yields a signed-out
    /// service rather than an error, so a corrupt file never blocks start-up.
    pub fn open(store: Arc<dyn SessionStore>) -> Self {
        let current = match store.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Could not rehydrate session, starting signed out");
                None
            }
        };
        if let Some(session) = &current {
            tracing::debug!(handle = %session.identity.handle, "Session rehydrated");
        }
        Self {
            current: RwLock::new(current),
            store,
        }
    }

    /// Signed-out service persisting to memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemorySessionStore::new()))
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.read().clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.read().is_some()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.access_token.clone())
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read().as_ref().and_then(|s| s.refresh_token.clone())
    }

    /// Install a new session and persist it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if persisting fails, in which case the
    /// current session is left as it was.
    pub fn set(&self, session: Session) -> Result<(), ClientError> {
        let mut guard = self.write();
        self.store.save(&session)?;
        *guard = Some(session);
        Ok(())
    }

    /// Swap the access token of the current session, leaving identity and
    /// refresh token untouched. Returns `false` when there is no session
    /// (for example, it was cleared while a refresh was in flight).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if persisting fails.
    pub fn replace_access_token(&self, access_token: &str) -> Result<bool, ClientError> {
        let mut guard = self.write();
        let Some(current) = guard.as_ref() else {
            return Ok(false);
        };
        let renewed = current.with_access_token(access_token);
        self.store.save(&renewed)?;
        *guard = Some(renewed);
        Ok(true)
    }

    /// Drop the session (sign-out or failed refresh).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the persisted copy cannot be removed.
    pub fn clear(&self) -> Result<(), ClientError> {
        let mut guard = self.write();
        *guard = None;
        self.store.clear()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("signed_in", &self.is_signed_in())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::sample_identity;

    #[test]
    fn open_rehydrates_from_store() {
        let stored = Session::new("a1", sample_identity("alice")).with_refresh_token("r1");
        let service = SessionService::open(Arc::new(MemorySessionStore::with_session(stored)));

        assert!(service.is_signed_in());
        assert_eq!(service.access_token().as_deref(), Some("a1"));
        assert_eq!(service.refresh_token().as_deref(), Some("r1"));
    }

    #[test]
    fn every_mutation_is_persisted() {
        let store = Arc::new(MemorySessionStore::new());
        let service = SessionService::open(store.clone());

        service
            .set(Session::new("a1", sample_identity("alice")).with_refresh_token("r1"))
            .unwrap();
        assert!(service.replace_access_token("a2").unwrap());
        assert_eq!(store.persisted().unwrap().access_token, "a2");
        assert_eq!(store.persisted().unwrap().identity.handle, "alice");

        service.clear().unwrap();
        assert!(store.persisted().is_none());
        assert_eq!(store.writes(), 3);
    }

    #[test]
    fn replace_without_session_is_a_no_op() {
        let store = Arc::new(MemorySessionStore::new());
        let service = SessionService::open(store.clone());

        assert!(!service.replace_access_token("a2").unwrap());
        assert!(!service.is_signed_in());
        assert_eq!(store.writes(), 0);
    }
}
