//! Command implementations.

pub mod status;
pub mod sync;
pub mod verify;
pub mod watch;

use crate::client::ReqwestClient;
use crate::OutputFormat;
use photosync_catalog::CatalogStore;
use photosync_engine::{FsLocalDirectory, HttpRemoteCatalog, SyncConfig, SyncEngine};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Engine type used by every command that talks to the server.
pub type CliEngine = SyncEngine<FsLocalDirectory, HttpRemoteCatalog<ReqwestClient>>;

/// Catalog directory name used when `--catalog` is not given.
const DEFAULT_CATALOG_DIR: &str = ".photosync";

/// Options shared by all commands.
pub struct Settings {
    /// Local sync folder.
    pub folder: Option<PathBuf>,
    /// Image server base URL.
    pub server: Option<String>,
    /// Catalog directory override.
    pub catalog: Option<PathBuf>,
    /// Concurrent transfers per pass.
    pub parallel: usize,
    /// Items requested per listing page.
    pub page_size: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// How results are printed.
    pub format: OutputFormat,
}

impl Settings {
    fn folder(&self) -> Result<&PathBuf, Box<dyn std::error::Error>> {
        self.folder
            .as_ref()
            .ok_or_else(|| "no sync folder given (use --folder)".into())
    }

    fn catalog_dir(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        match &self.catalog {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.folder()?.join(DEFAULT_CATALOG_DIR)),
        }
    }

    /// Opens the catalog, taking its process lock.
    pub fn open_catalog(&self) -> Result<CatalogStore, Box<dyn std::error::Error>> {
        let dir = self.catalog_dir()?;
        tracing::debug!(catalog = %dir.display(), "opening catalog");
        Ok(CatalogStore::open(&dir)?)
    }

    fn sync_config(&self) -> Result<SyncConfig, Box<dyn std::error::Error>> {
        Ok(SyncConfig::new(self.folder()?.clone())
            .with_page_size(self.page_size)
            .with_max_parallel_transfers(self.parallel)
            .with_timeout(self.timeout))
    }

    /// Builds an engine for the configured folder and server. The HTTP
    /// client takes its timeout from the engine configuration.
    pub fn engine(&self) -> Result<CliEngine, Box<dyn std::error::Error>> {
        let server = self
            .server
            .as_deref()
            .ok_or("no server URL given (use --server)")?;
        let config = self.sync_config()?;
        config.validate()?;

        let client = ReqwestClient::new(config.timeout)?;
        let remote = HttpRemoteCatalog::new(server, client);
        let catalog = Arc::new(self.open_catalog()?);

        Ok(SyncEngine::new(config, FsLocalDirectory::new(), remote, catalog)?)
    }

    /// Prints `value` as JSON, or `text` otherwise.
    pub fn emit<T: Serialize>(
        &self,
        value: &T,
        text: impl FnOnce(),
    ) -> Result<(), Box<dyn std::error::Error>> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }
}
