//! Local folder adapter.

use crate::error::{LocalError, LocalResult};
use filetime::FileTime;
use photosync_protocol::Timestamp;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Size and modification time of a local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub size: u64,
    /// Modification time, `None` if the platform could not report it.
    pub modified_at: Option<Timestamp>,
}

/// File operations on the user's sync folder.
///
/// Implement this trait to sync against something other than the real
/// filesystem.
pub trait LocalDirectory: Send + Sync {
    /// Lists the names of regular files directly inside `dir`.
    fn list(&self, dir: &Path) -> LocalResult<Vec<String>>;

    /// Reads a whole file.
    fn read_file(&self, path: &Path) -> LocalResult<Vec<u8>>;

    /// Creates or replaces a file.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> LocalResult<()>;

    /// Removes a file.
    fn delete_file(&self, path: &Path) -> LocalResult<()>;

    /// Returns size and modification time.
    fn stat(&self, path: &Path) -> LocalResult<FileStat>;

    /// Sets the modification time.
    fn set_modified_time(&self, path: &Path, modified_at: Timestamp) -> LocalResult<()>;

    /// Returns true if something exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Creates `path` and its parents if missing.
    fn ensure_dir(&self, path: &Path) -> LocalResult<()>;
}

/// [`LocalDirectory`] over `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLocalDirectory;

impl FsLocalDirectory {
    /// Creates the adapter.
    pub fn new() -> Self {
        Self
    }
}

impl LocalDirectory for FsLocalDirectory {
    fn list(&self, dir: &Path) -> LocalResult<Vec<String>> {
        let entries = fs::read_dir(dir).map_err(|e| LocalError::io("list", dir, &e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LocalError::io("list", dir, &e))?;
            // Symlinks are followed; sockets, fifos and directories are not files.
            let is_file = fs::metadata(entry.path())
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::warn!(name = ?raw, "skipping file with non-UTF-8 name");
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_file(&self, path: &Path) -> LocalResult<Vec<u8>> {
        fs::read(path).map_err(|e| LocalError::io("read", path, &e))
    }

    /// Writes to a hidden sibling first and renames it into place, so an
    /// interrupted write never leaves a truncated image under the real name.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> LocalResult<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = path.with_file_name(format!(".{file_name}.photosync-tmp"));

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp, path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&temp);
            LocalError::io("write", path, &e)
        })
    }

    fn delete_file(&self, path: &Path) -> LocalResult<()> {
        fs::remove_file(path).map_err(|e| LocalError::io("delete", path, &e))
    }

    fn stat(&self, path: &Path) -> LocalResult<FileStat> {
        let metadata = fs::metadata(path).map_err(|e| LocalError::io("stat", path, &e))?;
        Ok(FileStat {
            size: metadata.len(),
            modified_at: metadata.modified().ok().map(Timestamp::from_system_time),
        })
    }

    fn set_modified_time(&self, path: &Path, modified_at: Timestamp) -> LocalResult<()> {
        let mtime = FileTime::from_system_time(modified_at.to_system_time());
        filetime::set_file_mtime(path, mtime).map_err(|e| LocalError::io("set mtime", path, &e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn ensure_dir(&self, path: &Path) -> LocalResult<()> {
        fs::create_dir_all(path).map_err(|e| LocalError::io("create dir", path, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn list_returns_only_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.png"), b"b").unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let names = FsLocalDirectory.list(dir.path()).unwrap();
        assert_eq!(names, ["a.jpg", "b.png"]);
    }

    #[test]
    fn write_replaces_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");

        FsLocalDirectory.write_file(&path, b"first").unwrap();
        FsLocalDirectory.write_file(&path, b"second").unwrap();

        assert_eq!(FsLocalDirectory.read_file(&path).unwrap(), b"second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn mtime_round_trips_at_second_precision() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        FsLocalDirectory.write_file(&path, b"abc").unwrap();

        let target = Timestamp::from_secs(1_600_000_000);
        FsLocalDirectory.set_modified_time(&path, target).unwrap();

        let stat = FsLocalDirectory.stat(&path).unwrap();
        assert_eq!(stat.size, 3);
        assert_eq!(stat.modified_at.map(|t| t.truncate(1000)), Some(target));
    }

    #[test]
    fn missing_file_errors_carry_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.jpg");

        let err = FsLocalDirectory.delete_file(&path).unwrap_err();
        assert_eq!(err.operation, "delete");
        assert!(err.path.ends_with("gone.jpg"));
        assert!(!FsLocalDirectory.exists(&path));
    }

    #[test]
    fn ensure_dir_creates_parents() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        FsLocalDirectory.ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
