//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Prefix of the temporary file written next to the target before rename.
pub const TEMP_PREFIX: char = '~';

/// A file-based storage backend.
///
/// The snapshot lives in a single file. Writes go through the
/// write-then-rename pattern for crash safety:
///
/// 1. Write to `~<filename>` in the same directory
/// 2. Sync the temporary file to disk
/// 3. Rename it over `<filename>`
/// 4. Fsync the directory so the rename itself is durable
///
/// The target file is therefore always either the previous complete
/// snapshot or the new complete snapshot.
///
/// The containing directory is created on the first write, not on open.
///
/// # Example
///
/// ```no_run
/// use docstore_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("datastore/todos.json")).unwrap();
/// backend.replace(b"{}").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    temp_path: PathBuf,
}

impl FileBackend {
    /// Creates a backend for the file at `path`.
    ///
    /// Nothing is touched on disk until the first `replace`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` has no file name component.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))?;

        let temp_path = path.with_file_name(format!("{TEMP_PREFIX}{file_name}"));

        Ok(Self {
            path: path.to_path_buf(),
            temp_path,
        })
    }

    /// Returns the path to the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the temporary file used during writes.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// Syncs the containing directory so that a rename is durable.
    ///
    /// On Windows, NTFS journaling covers metadata updates and directory
    /// handles cannot be fsynced, so this is a no-op there.
    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        if let Some(dir) = self.parent_dir() {
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read(&self) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        if let Some(dir) = self.parent_dir() {
            fs::create_dir_all(dir)?;
        }

        let mut file = File::create(&self.temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        self.sync_directory()?;

        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
