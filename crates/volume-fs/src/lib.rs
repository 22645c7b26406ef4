//! Shared-volume client.
//!
//! Stands in for the distributed filesystem client: we only need
//! `open/read/write/append/readdir/unlink/close` and an advisory
//! whole-file lock. `LocalVolume` backs those primitives with a mounted
//! directory tree; a real deployment would swap this for a client of the
//! actual shared filesystem without touching any caller of the
//! [`SharedVolume`] trait.

use block_common::{BlockError, BlockResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Primitive surface required of a shared-volume client.
pub trait SharedVolume: Send + Sync {
    /// Root directory this handle is mounted at.
    fn root(&self) -> &Path;

    /// Reads an entire file's contents as UTF-8 text.
    fn read_to_string(&self, rel: &str) -> BlockResult<String>;

    /// Appends a single line (without the trailing newline) to a file,
    /// creating it if absent. Retries partial writes until the full line
    /// is flushed, then fsyncs; lines are always under one filesystem
    /// block so a single retried `write_all` suffices.
    fn append_line(&self, rel: &str, line: &str) -> BlockResult<()>;

    /// Appends several lines as a single atomic write (one syscall), used
    /// for the block header which is written as one multi-line record.
    fn append_lines(&self, rel: &str, lines: &[String]) -> BlockResult<()>;

    /// Creates a new file of exactly `len` bytes. Fails if it already exists.
    fn create_exact(&self, rel: &str, len: u64) -> BlockResult<()>;

    fn exists(&self, rel: &str) -> bool;

    fn unlink(&self, rel: &str) -> BlockResult<()>;

    /// Lists entries directly under `rel`, excluding `.` and `..`.
    fn read_dir_names(&self, rel: &str) -> BlockResult<Vec<String>>;

    /// Opens (creating if necessary) and acquires an exclusive advisory
    /// lock on `rel`. The lock is released when the returned guard drops
    /// or the process exits, whichever comes first.
    fn lock_file(&self, rel: &str) -> BlockResult<VolumeLock>;
}

/// A held advisory lock. Unlocks on drop; `fs2`'s underlying `flock`/
/// `LockFileEx` is released by the OS even if the process is killed
/// before the drop runs, so a crashed coordinator never deadlocks a
/// volume.
pub struct VolumeLock {
    file: File,
    path: PathBuf,
}

impl Drop for VolumeLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release volume lock");
        }
    }
}

/// A shared volume backed by a mounted local directory.
pub struct LocalVolume {
    root: PathBuf,
}

impl LocalVolume {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn ensure_parent(&self, path: &Path) -> BlockResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BlockError::io("create_dir_all", e))?;
        }
        Ok(())
    }
}

impl SharedVolume for LocalVolume {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read_to_string(&self, rel: &str) -> BlockResult<String> {
        fs::read_to_string(self.full_path(rel)).map_err(|e| BlockError::io("read_to_string", e))
    }

    fn append_line(&self, rel: &str, line: &str) -> BlockResult<()> {
        let path = self.full_path(rel);
        self.ensure_parent(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BlockError::io("open_append", e))?;

        // A single line is always < one filesystem block; retry any short
        // write until everything the caller asked for landed.
        let mut full = String::with_capacity(line.len() + 1);
        full.push_str(line);
        full.push('\n');
        write_all_retrying(&mut file, full.as_bytes())?;

        file.sync_data().map_err(|e| BlockError::io("sync_data", e))?;
        Ok(())
    }

    fn append_lines(&self, rel: &str, lines: &[String]) -> BlockResult<()> {
        let path = self.full_path(rel);
        self.ensure_parent(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BlockError::io("open_append", e))?;

        let mut full = String::new();
        for line in lines {
            full.push_str(line);
            full.push('\n');
        }
        write_all_retrying(&mut file, full.as_bytes())?;
        file.sync_data().map_err(|e| BlockError::io("sync_data", e))?;
        Ok(())
    }

    fn create_exact(&self, rel: &str, len: u64) -> BlockResult<()> {
        let path = self.full_path(rel);
        self.ensure_parent(&path)?;

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| BlockError::io("create_new", e))?;
        file.set_len(len).map_err(|e| BlockError::io("set_len", e))?;
        file.sync_all().map_err(|e| BlockError::io("sync_all", e))?;
        Ok(())
    }

    fn exists(&self, rel: &str) -> bool {
        self.full_path(rel).exists()
    }

    fn unlink(&self, rel: &str) -> BlockResult<()> {
        fs::remove_file(self.full_path(rel)).map_err(|e| BlockError::io("remove_file", e))
    }

    fn read_dir_names(&self, rel: &str) -> BlockResult<Vec<String>> {
        let path = self.full_path(rel);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&path).map_err(|e| BlockError::io("read_dir", e))? {
            let entry = entry.map_err(|e| BlockError::io("read_dir_entry", e))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn lock_file(&self, rel: &str) -> BlockResult<VolumeLock> {
        let path = self.full_path(rel);
        self.ensure_parent(&path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| BlockError::io("open_lock_file", e))?;

        FileExt::lock_exclusive(&file).map_err(|e| BlockError::LockFailed {
            volume: path.display().to_string(),
            source: e,
        })?;

        Ok(VolumeLock { file, path })
    }
}

fn write_all_retrying(file: &mut File, bytes: &[u8]) -> BlockResult<()> {
    let mut written = 0;
    while written < bytes.len() {
        let n = file
            .write(&bytes[written..])
            .map_err(|e| BlockError::io("write", e))?;
        if n == 0 {
            return Err(BlockError::io(
                "write",
                std::io::Error::new(std::io::ErrorKind::WriteZero, "wrote zero bytes"),
            ));
        }
        written += n;
    }
    Ok(())
}
