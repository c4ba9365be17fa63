//! Append-only JSONL sink.
//!
//! The `watch` loop and one-shot CLI invocations can share a log file, so
//! each formatted event goes out in a single `write_all` on an `O_APPEND`
//! handle and never sits in a user-space buffer.

use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Shared handle to the log file. Cloning shares the handle.
#[derive(Clone)]
pub struct JsonlSink {
    path: Arc<PathBuf>,
    file: Arc<Mutex<File>>,
}

impl JsonlSink {
    /// Open `path` for appending, creating missing parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for JsonlSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for JsonlSink {
    type Writer = JsonlSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
