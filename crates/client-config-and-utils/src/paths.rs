//! On-disk layout under `~/.momentum`:
//!
//! ```text
//! ~/.momentum/
//!   config.json
//!   session.json
//!   logs/
//! ```

use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

const ROOT_DIR: &str = ".momentum";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Layout rooted in the current user's home directory.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("$HOME is not set".to_string()))?;
        Ok(Self::with_base_dir(home.join(ROOT_DIR)))
    }

    /// Layout rooted at `root` (tests, `--base-dir`).
    pub fn with_base_dir(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Where the file-backed session store keeps the current session.
    pub fn session_file(&self) -> PathBuf {
        self.root.join("session.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
