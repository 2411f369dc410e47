//! # Session Persistence
//!
//! The [`SessionStore`] trait is the persistence hook of the session service.
//! Two implementations ship with the crate:
//!
//! - [`FileSessionStore`]: a small JSON key-value file. The session lives under
//!   the fixed key [`STORAGE_KEY`]; other keys in the file are preserved.
//! - [`MemorySessionStore`]: process-local, used by tests and by callers that
//!   do not want anything written to disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use super::model::Session;
use crate::error::ClientError;

/// Key under which the serialised session is stored.
pub const STORAGE_KEY: &str = "auth-storage";

/// Consumer-provided session persistence.
///
/// `load` is called once when the session service starts; `save` and `clear`
/// after every mutation.
pub trait SessionStore: Send + Sync + 'static {
    /// Read the persisted session, if any.
    fn load(&self) -> Result<Option<Session>, ClientError>;

    /// Persist the given session, replacing the previous one.
    fn save(&self, session: &Session) -> Result<(), ClientError>;

    /// Remove the persisted session.
    fn clear(&self) -> Result<(), ClientError>;
}

/// JSON file backed store.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> Result<Option<String>, ClientError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display())))?;
        Ok(Some(raw).filter(|raw| !raw.trim().is_empty()))
    }

    fn read_entries(&self) -> Result<BTreeMap<String, Value>, ClientError> {
        match self.read_raw()? {
            None => Ok(BTreeMap::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display()))),
        }
    }

    /// Entries to rewrite on `save`/`clear`. An unparseable file is replaced
    /// rather than failing every later write; the flag reports that case.
    fn entries_for_write(&self) -> Result<(BTreeMap<String, Value>, bool), ClientError> {
        let Some(raw) = self.read_raw()? else {
            return Ok((BTreeMap::new(), false));
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok((entries, false)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "overwriting unreadable session file");
                Ok((BTreeMap::new(), true))
            }
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ClientError::Storage(format!("{}: {e}", parent.display())))?;
            }
        }
        let body = serde_json::to_string_pretty(entries)
            .map_err(|e| ClientError::Storage(e.to_string()))?;

        // Write next to the target then rename, so a crash never leaves half a file.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)
            .map_err(|e| ClientError::Storage(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, ClientError> {
        let entries = self.read_entries()?;
        match entries.get(STORAGE_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ClientError::Storage(format!("{STORAGE_KEY}: {e}"))),
        }
    }

    fn save(&self, session: &Session) -> Result<(), ClientError> {
        let (mut entries, _) = self.entries_for_write()?;
        let value =
            serde_json::to_value(session).map_err(|e| ClientError::Storage(e.to_string()))?;
        entries.insert(STORAGE_KEY.to_string(), value);
        self.write_entries(&entries)
    }

    fn clear(&self) -> Result<(), ClientError> {
        let (mut entries, corrupt) = self.entries_for_write()?;
        if entries.remove(STORAGE_KEY).is_some() || corrupt {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

/// In-memory store. Counts writes so tests can assert persistence happened.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    session: Option<Session>,
    writes: usize,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a session, as if it had been persisted earlier.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                session: Some(session),
                writes: 0,
            }),
        }
    }

    /// Snapshot of what is currently persisted.
    #[must_use]
    pub fn persisted(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Number of `save`/`clear` calls seen so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, ClientError> {
        Ok(self.lock().session.clone())
    }

    fn save(&self, session: &Session) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.session = Some(session.clone());
        state.writes += 1;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.session = None;
        state.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::sample_identity;
    use tempfile::tempdir;

    #[test]
    fn file_store_round_trips_under_fixed_key() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));
        assert!(store.load().unwrap().is_none());

        let session = Session::new("a1", sample_identity("alice")).with_refresh_token("r1");
        store.save(&session).unwrap();

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[STORAGE_KEY]["access_token"], "a1");
        assert_eq!(store.load().unwrap(), Some(session));
    }

    #[test]
    fn file_store_clear_keeps_other_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let store = FileSessionStore::new(&path);
        store
            .save(&Session::new("a1", sample_identity("alice")))
            .unwrap();
        store.clear().unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert!(raw.get(STORAGE_KEY).is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileSessionStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ClientError::Storage(_)));
    }

    #[test]
    fn save_replaces_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        let store = FileSessionStore::new(&path);

        let session = Session::new("a2", sample_identity("alice")).with_refresh_token("r2");
        store.save(&session).unwrap();

        assert_eq!(store.load().unwrap(), Some(session));
    }

    #[test]
    fn clear_resets_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        let store = FileSessionStore::new(&path);

        store.clear().unwrap();

        assert!(store.load().unwrap().is_none());
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({}));
    }

    #[test]
    fn unreadable_path_still_fails_writes() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let err = store
            .save(&Session::new("a1", sample_identity("alice")))
            .unwrap_err();
        assert!(matches!(err, ClientError::Storage(_)));
    }

    #[test]
    fn memory_store_counts_writes() {
        let store = MemorySessionStore::new();
        store
            .save(&Session::new("a1", sample_identity("alice")))
            .unwrap();
        store.clear().unwrap();

        assert_eq!(store.writes(), 2);
        assert!(store.persisted().is_none());
    }
}
