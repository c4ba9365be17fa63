//! Session persistence.

use crate::{IdentityResult, Session};
use std::fs;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Where the committed session lives between runs.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> IdentityResult<Option<Session>>;
    fn save(&self, session: &Session) -> IdentityResult<()>;
    fn clear(&self) -> IdentityResult<()>;
}

/// Process-local store; forgets everything on exit.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> IdentityResult<Option<Session>> {
        Ok(self.session.lock().clone())
    }

    fn save(&self, session: &Session) -> IdentityResult<()> {
        *self.session.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> IdentityResult<()> {
        *self.session.lock() = None;
        Ok(())
    }
}

/// JSON file store (`~/.momentum/session.json` by default).
///
/// Writes go to a sibling temp file first and are renamed into place.
/// An unreadable file is treated as no session and removed.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> IdentityResult<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Session>(&contents) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Stored session is corrupt, clearing it");
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> IdentityResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(session)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), user_id = %session.user.id, "Session saved");
        Ok(())
    }

    fn clear(&self) -> IdentityResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
