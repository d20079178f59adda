//! Locked, atomically rewritten state files.
//!
//! Each state file `<name>` gets two siblings:
//!
//! ```text
//! <dir>/
//! ├─ <name>          # the state itself
//! ├─ <name>.lock     # advisory lock, held for every read-modify-write
//! └─ <name>.tmp      # scratch file for write-then-rename
//! ```

use crate::error::{StateError, StateResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long to wait for another process to release the advisory lock.
const LOCK_WAIT: Duration = Duration::from_secs(5);
const LOCK_POLL: Duration = Duration::from_millis(20);

/// A state file guarded by an in-process mutex and an advisory file lock.
#[derive(Debug)]
pub(crate) struct StateFile {
    path: PathBuf,
    lock_path: PathBuf,
    temp_path: PathBuf,
    guard: Mutex<()>,
}

impl StateFile {
    pub(crate) fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock_path: sibling(path, ".lock"),
            temp_path: sibling(path, ".tmp"),
            guard: Mutex::new(()),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` while holding both the in-process and the on-disk lock.
    pub(crate) fn with_lock<T>(&self, f: impl FnOnce(&Self) -> StateResult<T>) -> StateResult<T> {
        let _in_process = self.guard.lock();
        let lock_file = self.acquire_file_lock()?;
        let result = f(self);
        // Dropping the handle would release it too, but silently.
        if let Err(e) = FileExt::unlock(&lock_file) {
            tracing::warn!(path = %self.lock_path.display(), error = %e, "failed to release state lock");
        }
        result
    }

    /// Reads the file, returning `None` if it does not exist.
    pub(crate) fn read(&self) -> StateResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(StateError::corrupted(
                &self.path,
                "file is not valid UTF-8",
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the file content atomically.
    ///
    /// Uses write-then-rename for crash safety:
    /// 1. Write to the temporary sibling
    /// 2. Sync the temporary file to disk
    /// 3. Rename it over the state file
    /// 4. Fsync the directory so the rename is durable
    pub(crate) fn write_atomic(&self, content: &str) -> StateResult<()> {
        if let Some(parent) = self.parent_dir() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&self.temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        self.sync_directory()?;
        Ok(())
    }

    fn acquire_file_lock(&self) -> StateResult<File> {
        if let Some(parent) = self.parent_dir() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;

        let deadline = Instant::now() + LOCK_WAIT;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(file),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(StateError::Locked(self.path.clone()));
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StateResult<()> {
        let dir = File::open(self.parent_dir().unwrap_or(Path::new(".")))?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StateResult<()> {
        // NTFS journals metadata; directory handles cannot be fsynced.
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("state"));
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sibling_paths() {
        let file = StateFile::new(Path::new("/var/lib/sync/cursor.txt"));
        assert_eq!(file.lock_path, Path::new("/var/lib/sync/cursor.txt.lock"));
        assert_eq!(file.temp_path, Path::new("/var/lib/sync/cursor.txt.tmp"));
    }

    #[test]
    fn read_missing_is_none() {
        let dir = tempdir().unwrap();
        let file = StateFile::new(&dir.path().join("absent"));
        assert!(file.read().unwrap().is_none());
    }

    #[test]
    fn write_creates_parent_dirs_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state");
        let file = StateFile::new(&path);

        file.with_lock(|f| f.write_atomic("17")).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "17");
        assert!(!file.temp_path.exists());
    }

    #[test]
    fn lock_is_reentrant_across_instances_after_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state");
        let a = StateFile::new(&path);
        let b = StateFile::new(&path);

        a.with_lock(|f| f.write_atomic("1")).unwrap();
        b.with_lock(|f| f.write_atomic("2")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "2");
    }
}
