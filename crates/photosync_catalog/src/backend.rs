//! Byte stores underneath the sync log.

use crate::error::CatalogResult;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An append-only byte store holding framed log records.
///
/// Backends do not interpret the bytes. The catalog owns the frame format.
///
/// # Invariants
///
/// - `append` returns the offset at which the data starts
/// - `read_all` returns every byte appended and not truncated away
/// - after `sync` returns, appended data survives process termination
pub trait LogBackend: Send + Sync {
    /// Reads the whole store.
    fn read_all(&self) -> CatalogResult<Vec<u8>>;

    /// Appends `data`, returning its starting offset.
    fn append(&mut self, data: &[u8]) -> CatalogResult<u64>;

    /// Makes appended data durable.
    fn sync(&mut self) -> CatalogResult<()>;

    /// Returns the current length in bytes.
    fn len(&self) -> CatalogResult<u64>;

    /// Returns true if nothing has been appended.
    fn is_empty(&self) -> CatalogResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Cuts the store back to `len` bytes. Used to drop a torn tail record.
    fn truncate(&mut self, len: u64) -> CatalogResult<()>;
}

/// A log backend on a single OS file.
#[derive(Debug)]
pub struct FileLogBackend {
    path: PathBuf,
    file: RwLock<File>,
    len: u64,
}

impl FileLogBackend {
    /// Opens or creates the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            len,
        })
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogBackend for FileLogBackend {
    fn read_all(&self) -> CatalogResult<Vec<u8>> {
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::with_capacity(usize::try_from(self.len).unwrap_or(0));
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> CatalogResult<u64> {
        let offset = self.len;
        if data.is_empty() {
            return Ok(offset);
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        self.len += data.len() as u64;
        Ok(offset)
    }

    fn sync(&mut self) -> CatalogResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn len(&self) -> CatalogResult<u64> {
        Ok(self.len)
    }

    fn truncate(&mut self, len: u64) -> CatalogResult<()> {
        if len >= self.len {
            return Ok(());
        }
        let file = self.file.write();
        file.set_len(len)?;
        file.sync_all()?;
        self.len = len;
        Ok(())
    }
}

/// An in-memory log backend for tests and ephemeral catalogs.
#[derive(Debug, Default)]
pub struct MemoryLogBackend {
    data: Vec<u8>,
}

impl MemoryLogBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-filled with `data`, for recovery tests.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl LogBackend for MemoryLogBackend {
    fn read_all(&self) -> CatalogResult<Vec<u8>> {
        Ok(self.data.clone())
    }

    fn append(&mut self, data: &[u8]) -> CatalogResult<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(data);
        Ok(offset)
    }

    fn sync(&mut self) -> CatalogResult<()> {
        Ok(())
    }

    fn len(&self) -> CatalogResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn truncate(&mut self, len: u64) -> CatalogResult<()> {
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        self.data.truncate(len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_append_reopen_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync.log");

        {
            let mut backend = FileLogBackend::open(&path).unwrap();
            assert!(backend.is_empty().unwrap());
            assert_eq!(backend.append(b"hello").unwrap(), 0);
            assert_eq!(backend.append(b" world").unwrap(), 5);
            backend.sync().unwrap();
        }

        let backend = FileLogBackend::open(&path).unwrap();
        assert_eq!(backend.len().unwrap(), 11);
        assert_eq!(backend.read_all().unwrap(), b"hello world");
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn file_truncate_drops_tail() {
        let dir = tempdir().unwrap();
        let mut backend = FileLogBackend::open(&dir.path().join("sync.log")).unwrap();
        backend.append(b"keep-torn").unwrap();
        backend.truncate(4).unwrap();
        assert_eq!(backend.read_all().unwrap(), b"keep");

        // Growing is not truncation.
        backend.truncate(100).unwrap();
        assert_eq!(backend.len().unwrap(), 4);

        assert_eq!(backend.append(b"!").unwrap(), 4);
        assert_eq!(backend.read_all().unwrap(), b"keep!");
    }

    #[test]
    fn memory_backend_behaves_like_file() {
        let mut backend = MemoryLogBackend::new();
        assert_eq!(backend.append(b"abc").unwrap(), 0);
        assert_eq!(backend.append(b"").unwrap(), 3);
        backend.truncate(1).unwrap();
        assert_eq!(backend.read_all().unwrap(), b"a");
        assert_eq!(MemoryLogBackend::with_data(vec![1, 2]).len().unwrap(), 2);
    }
}
