//! Test fixtures.
//!
//! [`TestBed`] owns a temporary directory holding the sync folder and the
//! catalog directory, so everything is cleaned up when it drops.

use filetime::FileTime;
use photosync_catalog::CatalogStore;
use photosync_engine::{
    FsLocalDirectory, MemoryRemoteCatalog, RetryConfig, SyncConfig, SyncEngine,
};
use photosync_protocol::Timestamp;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// The engine type used by [`TestBed`].
pub type TestEngine = SyncEngine<FsLocalDirectory, MemoryRemoteCatalog>;

/// A sync folder, a remote catalog and a catalog store in a temp directory.
pub struct TestBed {
    engine: TestEngine,
    folder: PathBuf,
    catalog_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestBed {
    /// Creates a test bed with sequential item processing and fast retries.
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Creates a test bed, letting the caller adjust the configuration.
    pub fn with_config(configure: impl FnOnce(SyncConfig) -> SyncConfig) -> Self {
        Self::with_remote(MemoryRemoteCatalog::new(), configure)
    }

    /// Creates a test bed around a prepared remote catalog.
    pub fn with_remote(
        remote: MemoryRemoteCatalog,
        configure: impl FnOnce(SyncConfig) -> SyncConfig,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let folder = temp_dir.path().join("library");
        let catalog_dir = temp_dir.path().join("catalog");
        fs::create_dir(&folder).expect("Failed to create sync folder");

        let config = configure(
            SyncConfig::new(&folder)
                .with_max_parallel_transfers(1)
                .with_retry(test_retry()),
        );
        let catalog = Arc::new(CatalogStore::open(&catalog_dir).expect("Failed to open catalog"));
        let engine = SyncEngine::new(config, FsLocalDirectory::new(), remote, catalog)
            .expect("Failed to create engine");

        Self {
            engine,
            folder,
            catalog_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &TestEngine {
        &self.engine
    }

    /// Returns the in-memory remote catalog.
    pub fn remote(&self) -> &MemoryRemoteCatalog {
        self.engine.remote()
    }

    /// Returns the catalog store.
    pub fn catalog(&self) -> &CatalogStore {
        self.engine.catalog()
    }

    /// Returns the sync folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Returns the catalog directory.
    pub fn catalog_dir(&self) -> &Path {
        &self.catalog_dir
    }

    /// Writes a local file with the given mtime (whole seconds).
    pub fn write_local(&self, name: &str, bytes: &[u8], mtime_secs: u64) -> PathBuf {
        let path = self.folder.join(name);
        fs::write(&path, bytes).expect("Failed to write local file");
        set_mtime(&path, Timestamp::from_secs(mtime_secs));
        path
    }

    /// Removes a local file.
    pub fn remove_local(&self, name: &str) {
        fs::remove_file(self.folder.join(name)).expect("Failed to remove local file");
    }

    /// Reads a local file, if present.
    pub fn local_bytes(&self, name: &str) -> Option<Vec<u8>> {
        fs::read(self.folder.join(name)).ok()
    }

    /// Returns the local file's mtime.
    pub fn local_mtime(&self, name: &str) -> Option<Timestamp> {
        fs::metadata(self.folder.join(name))
            .and_then(|m| m.modified())
            .ok()
            .map(Timestamp::from_system_time)
    }

    /// Returns local file names, sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.folder)
            .expect("Failed to list sync folder")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for TestBed {
    fn default() -> Self {
        Self::new()
    }
}

/// Retries without noticeable delay.
pub fn test_retry() -> RetryConfig {
    RetryConfig::new(3)
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5))
        .with_jitter(false)
}

/// Sets a file's mtime.
pub fn set_mtime(path: &Path, ts: Timestamp) {
    filetime::set_file_mtime(path, FileTime::from_system_time(ts.to_system_time()))
        .expect("Failed to set mtime");
}

/// Runs a test with a fresh [`TestBed`].
pub fn with_test_bed<F, R>(f: F) -> R
where
    F: FnOnce(&TestBed) -> R,
{
    let bed = TestBed::new();
    f(&bed)
}
