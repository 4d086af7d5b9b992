use super::{PersistenceError, SessionSnapshot};
use crate::workflows::affinity::session::TestSession;
use crate::workflows::affinity::strategy::StrategyCatalog;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// Single-slot storage for the in-progress session.
pub trait SessionStore: Send + Sync {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError>;
    fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError>;
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// Snapshot kept as pretty-printed JSON in one file.
pub struct JsonFileSessionStore {
    path: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for JsonFileSessionStore {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        std::fs::write(&self.path, snapshot.to_json()?).map_err(|err| self.io_error(err))?;
        info!(path = %self.path.display(), "session snapshot saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => SessionSnapshot::from_json(&raw).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// Holds the raw JSON in memory so corrupt documents can be exercised too.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot
            .lock()
            .expect("session store mutex poisoned")
            .is_none()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        let raw = snapshot.to_json()?;
        *self.slot.lock().expect("session store mutex poisoned") = Some(raw);
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        let guard = self.slot.lock().expect("session store mutex poisoned");
        guard
            .as_deref()
            .map(SessionSnapshot::from_json)
            .transpose()
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.slot.lock().expect("session store mutex poisoned") = None;
        Ok(())
    }
}

#[derive(Debug)]
pub enum ResumeOutcome {
    Resumed(Box<TestSession>),
    /// Nothing was stored.
    Fresh,
    /// The stored snapshot could not be used and has been removed.
    Discarded(PersistenceError),
}

/// Load the stored snapshot. A corrupt snapshot is cleared so the caller
/// starts over from a fresh session; strategy and I/O errors are returned
/// with the snapshot left in place.
pub fn resume_session<S: SessionStore + ?Sized>(
    store: &S,
    catalog: &StrategyCatalog,
) -> Result<ResumeOutcome, PersistenceError> {
    let restored = store
        .load()
        .and_then(|snapshot| snapshot.map(|s| s.into_session(catalog)).transpose());

    match restored {
        Ok(Some(session)) => {
            info!(
                user = %session.settings().user_id,
                rated = session.ratings().rated_count(),
                "session resumed"
            );
            Ok(ResumeOutcome::Resumed(Box::new(session)))
        }
        Ok(None) => Ok(ResumeOutcome::Fresh),
        Err(err) if err.is_corrupt_document() => {
            warn!(error = %err, "discarding unusable session snapshot");
            store.clear()?;
            Ok(ResumeOutcome::Discarded(err))
        }
        Err(err) => {
            warn!(error = %err, "session snapshot kept; it could not be resumed");
            Err(err)
        }
    }
}
