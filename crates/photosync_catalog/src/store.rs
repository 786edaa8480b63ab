//! The catalog store.

use crate::backend::{FileLogBackend, LogBackend, MemoryLogBackend};
use crate::error::{CatalogError, CatalogResult};
use crate::frame::{encode_frame, scan_frames};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use photosync_protocol::{Item, PassStatus, Replica, SyncLogEntry, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const ITEMS_FILE: &str = "ITEMS";
const ITEMS_TEMP: &str = "ITEMS.tmp";
const LOG_FILE: &str = "sync.log";

/// Counts and last sync time, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStatus {
    /// Items recorded for the local replica after the last pass.
    pub local_count: usize,
    /// Items recorded for the remote replica after the last pass.
    pub remote_count: usize,
    /// Finish time of the most recent successful pass.
    pub last_sync_time: Option<Timestamp>,
}

/// Integrity report for the sync log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Number of intact frames.
    pub records: usize,
    /// Frames whose checksum is fine but whose payload does not decode.
    pub undecodable: Vec<u64>,
    /// Length of the intact prefix.
    pub valid_bytes: u64,
    /// Total length of the log.
    pub total_bytes: u64,
    /// True if the log ends in a partial record.
    pub torn_tail: bool,
}

impl VerifyReport {
    /// Returns true if every byte of the log belongs to a decodable record.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.torn_tail && self.undecodable.is_empty() && self.valid_bytes == self.total_bytes
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ItemRecords {
    local: Vec<Item>,
    remote: Vec<Item>,
}

impl ItemRecords {
    fn get(&self, replica: Replica) -> &Vec<Item> {
        match replica {
            Replica::Local => &self.local,
            Replica::Remote => &self.remote,
        }
    }

    fn get_mut(&mut self, replica: Replica) -> &mut Vec<Item> {
        match replica {
            Replica::Local => &mut self.local,
            Replica::Remote => &mut self.remote,
        }
    }
}

/// Durable item records plus the append-only sync event log.
///
/// # Thread Safety
///
/// The store is `Send + Sync`. Appends are serialized internally; readers
/// see entries as soon as their append returns.
///
/// A store opened on a directory holds an exclusive advisory lock on it, so
/// two processes cannot sync against the same catalog at once.
pub struct CatalogStore {
    dir: Option<PathBuf>,
    log: Mutex<Box<dyn LogBackend>>,
    entries: RwLock<Vec<SyncLogEntry>>,
    items: RwLock<ItemRecords>,
    _lock: Option<File>,
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("dir", &self.dir)
            .field("entries", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl CatalogStore {
    /// Opens or creates a catalog directory.
    ///
    /// A torn record at the end of the log is dropped and the file is
    /// truncated back to the last intact record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the path exists and is not a directory
    /// - another process holds the lock ([`CatalogError::Locked`])
    /// - the log is corrupted before its tail
    /// - an I/O error occurs
    pub fn open(path: &Path) -> CatalogResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(CatalogError::NotADirectory(path.display().to_string()));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CatalogError::Locked(path.display().to_string()));
        }

        let backend = FileLogBackend::open(&path.join(LOG_FILE))?;
        let items = load_items(&path.join(ITEMS_FILE))?;
        let mut store = Self::with_backend(Box::new(backend))?;
        store.dir = Some(path.to_path_buf());
        store._lock = Some(lock_file);
        *store.items.get_mut() = items;

        debug!(
            path = %path.display(),
            entries = store.entries.read().len(),
            "catalog opened"
        );
        Ok(store)
    }

    /// Creates an ephemeral catalog that lives only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            log: Mutex::new(Box::new(MemoryLogBackend::new())),
            entries: RwLock::new(Vec::new()),
            items: RwLock::new(ItemRecords::default()),
            _lock: None,
        }
    }

    /// Creates a catalog over an arbitrary log backend, replaying its records.
    /// Item records are kept in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is corrupted before its tail or a record
    /// does not decode.
    pub fn with_backend(mut backend: Box<dyn LogBackend>) -> CatalogResult<Self> {
        let entries = replay(backend.as_mut())?;
        Ok(Self {
            dir: None,
            log: Mutex::new(backend),
            entries: RwLock::new(entries),
            items: RwLock::new(ItemRecords::default()),
            _lock: None,
        })
    }

    /// Returns the catalog directory, if the store is on disk.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Appends a log entry and makes it durable.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails. The in-memory view is
    /// only updated after the write succeeded.
    pub fn append_sync_log(&self, entry: &SyncLogEntry) -> CatalogResult<()> {
        let frame = encode_frame(&to_cbor(entry)?)?;
        {
            let mut log = self.log.lock();
            let offset = log.append(&frame)?;
            log.sync()?;
            debug!(
                offset,
                pass_id = %entry.pass_id,
                direction = %entry.direction,
                status = %entry.status,
                "sync log entry appended"
            );
        }
        self.entries.write().push(entry.clone());
        Ok(())
    }

    /// Replaces the recorded items of one replica.
    ///
    /// # Errors
    ///
    /// Returns an error if the item file cannot be written.
    pub fn record_items(&self, replica: Replica, items: &[Item]) -> CatalogResult<()> {
        let mut records = self.items.write();
        *records.get_mut(replica) = items.to_vec();
        if let Some(dir) = &self.dir {
            save_items(dir, &records)?;
        }
        Ok(())
    }

    /// Returns the recorded items of one replica.
    #[must_use]
    pub fn items(&self, replica: Replica) -> Vec<Item> {
        self.items.read().get(replica).clone()
    }

    /// Returns item counts and the last successful sync time.
    #[must_use]
    pub fn query_status(&self) -> CatalogStatus {
        let items = self.items.read();
        let last_sync_time = self
            .entries
            .read()
            .iter()
            .rev()
            .find(|e| e.status == PassStatus::Success)
            .map(|e| e.timestamp);

        CatalogStatus {
            local_count: items.local.len(),
            remote_count: items.remote.len(),
            last_sync_time,
        }
    }

    /// Returns up to `limit` log entries, newest first.
    #[must_use]
    pub fn query_logs(&self, limit: usize) -> Vec<SyncLogEntry> {
        self.entries
            .read()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the total number of log entries.
    #[must_use]
    pub fn log_len(&self) -> usize {
        self.entries.read().len()
    }

    /// Re-reads the log and checks every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or is corrupted before its
    /// tail.
    pub fn verify(&self) -> CatalogResult<VerifyReport> {
        let data = self.log.lock().read_all()?;
        let scan = scan_frames(&data)?;
        let undecodable = scan
            .frames
            .iter()
            .filter(|(_, payload)| from_cbor::<SyncLogEntry>(payload).is_err())
            .map(|(offset, _)| *offset)
            .collect();

        Ok(VerifyReport {
            records: scan.frames.len(),
            undecodable,
            valid_bytes: scan.valid_len,
            total_bytes: data.len() as u64,
            torn_tail: scan.torn_tail,
        })
    }
}

fn replay(backend: &mut dyn LogBackend) -> CatalogResult<Vec<SyncLogEntry>> {
    let data = backend.read_all()?;
    let scan = scan_frames(&data)?;

    if scan.torn_tail {
        warn!(
            valid_bytes = scan.valid_len,
            total_bytes = data.len(),
            "dropping torn record at end of sync log"
        );
        backend.truncate(scan.valid_len)?;
    }

    scan.frames
        .iter()
        .map(|(offset, payload)| {
            from_cbor(payload).map_err(|e| CatalogError::corrupted(*offset, e.to_string()))
        })
        .collect()
}

fn load_items(path: &Path) -> CatalogResult<ItemRecords> {
    if !path.exists() {
        return Ok(ItemRecords::default());
    }
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    if data.is_empty() {
        return Ok(ItemRecords::default());
    }
    from_cbor(&data)
}

/// Writes the item file with write-then-rename so readers never see a
/// partial file.
fn save_items(dir: &Path, records: &ItemRecords) -> CatalogResult<()> {
    let temp = dir.join(ITEMS_TEMP);
    let data = to_cbor(records)?;

    let mut file = File::create(&temp)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp, dir.join(ITEMS_FILE))?;
    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> CatalogResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> CatalogResult<()> {
    Ok(())
}

fn to_cbor<T: Serialize>(value: &T) -> CatalogResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(CatalogError::codec)?;
    Ok(buf)
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CatalogResult<T> {
    ciborium::from_reader(bytes).map_err(CatalogError::codec)
}
