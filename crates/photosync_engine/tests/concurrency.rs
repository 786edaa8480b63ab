//! Busy refusal, cancellation and adapter fault handling.

use photosync_catalog::CatalogStore;
use photosync_engine::{
    CancelHandle, FileStat, FsLocalDirectory, LocalDirectory, LocalError, LocalResult,
    MemoryRemoteCatalog, Page, PageRequest, Pagination, RemoteCatalog, RemoteError, RemoteResult,
    SyncConfig, SyncEngine, SyncError, SyncState,
};
use photosync_protocol::{Item, PassStatus, Replica, SkipReason, Strategy, SyncAction, Timestamp};
use photosync_testkit::set_mtime;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

/// Delegates to a memory catalog, with hooks on listing and download.
struct HookedRemote {
    inner: MemoryRemoteCatalog,
    on_list: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    on_fetch: Mutex<Option<CancelHandle>>,
}

impl HookedRemote {
    fn new(inner: MemoryRemoteCatalog) -> Self {
        Self {
            inner,
            on_list: Mutex::new(None),
            on_fetch: Mutex::new(None),
        }
    }
}

impl RemoteCatalog for HookedRemote {
    fn list_items(&self, request: PageRequest) -> RemoteResult<Page> {
        if let Some((entered, release)) = self.on_list.lock().unwrap().take() {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        self.inner.list_items(request)
    }

    fn fetch_bytes(&self, id: &str) -> RemoteResult<Vec<u8>> {
        let bytes = self.inner.fetch_bytes(id);
        if let Some(handle) = self.on_fetch.lock().unwrap().take() {
            handle.cancel();
        }
        bytes
    }

    fn create_item(
        &self,
        bytes: &[u8],
        display_name: &str,
        modified_at: Option<Timestamp>,
    ) -> RemoteResult<Item> {
        self.inner.create_item(bytes, display_name, modified_at)
    }

    fn delete_item(&self, id: &str) -> RemoteResult<()> {
        self.inner.delete_item(id)
    }
}

/// A real folder with per-name faults.
#[derive(Default)]
struct FaultyLocal {
    inner: FsLocalDirectory,
    unstattable: HashSet<String>,
    unreadable: HashSet<String>,
    frozen_mtime: HashSet<String>,
    panic_on_write: AtomicBool,
}

impl FaultyLocal {
    fn check(&self, set: &HashSet<String>, operation: &'static str, path: &Path) -> LocalResult<()> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if set.contains(&name) {
            return Err(LocalError {
                operation,
                path: path.display().to_string(),
                message: "permission denied".into(),
            });
        }
        Ok(())
    }
}

impl LocalDirectory for FaultyLocal {
    fn list(&self, dir: &Path) -> LocalResult<Vec<String>> {
        self.inner.list(dir)
    }
    fn read_file(&self, path: &Path) -> LocalResult<Vec<u8>> {
        self.check(&self.unreadable, "read", path)?;
        self.inner.read_file(path)
    }
    fn write_file(&self, path: &Path, bytes: &[u8]) -> LocalResult<()> {
        if self.panic_on_write.load(Ordering::SeqCst) {
            panic!("disk controller fault");
        }
        self.inner.write_file(path, bytes)
    }
    fn delete_file(&self, path: &Path) -> LocalResult<()> {
        self.inner.delete_file(path)
    }
    fn stat(&self, path: &Path) -> LocalResult<FileStat> {
        self.check(&self.unstattable, "stat", path)?;
        self.inner.stat(path)
    }
    fn set_modified_time(&self, path: &Path, modified_at: Timestamp) -> LocalResult<()> {
        self.check(&self.frozen_mtime, "set mtime", path)?;
        self.inner.set_modified_time(path, modified_at)
    }
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }
    fn ensure_dir(&self, path: &Path) -> LocalResult<()> {
        self.inner.ensure_dir(path)
    }
}

/// A server that claims more pages forever.
#[derive(Default)]
struct EndlessRemote {
    list_calls: AtomicU32,
}

impl RemoteCatalog for EndlessRemote {
    fn list_items(&self, request: PageRequest) -> RemoteResult<Page> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Page {
            items: vec![Item::remote(
                request.page.to_string(),
                format!("p{}.jpg", request.page),
                format!("p{}.jpg", request.page),
                1,
                Timestamp::from_secs(1_600_000_000),
            )],
            pagination: Pagination {
                page: request.page,
                limit: request.limit,
                total: 3,
                has_more: true,
            },
        })
    }

    fn fetch_bytes(&self, _id: &str) -> RemoteResult<Vec<u8>> {
        Ok(vec![7])
    }

    fn create_item(&self, _: &[u8], _: &str, _: Option<Timestamp>) -> RemoteResult<Item> {
        Err(RemoteError::invalid_response("read-only"))
    }

    fn delete_item(&self, _id: &str) -> RemoteResult<()> {
        Err(RemoteError::invalid_response("read-only"))
    }
}

fn engine_with<L: LocalDirectory, R: RemoteCatalog>(
    dir: &TempDir,
    local: L,
    remote: R,
) -> SyncEngine<L, R> {
    let config = SyncConfig::new(dir.path()).with_max_parallel_transfers(1);
    SyncEngine::new(config, local, remote, Arc::new(CatalogStore::in_memory())).unwrap()
}

#[test]
fn concurrent_pass_is_refused() {
    let dir = TempDir::new().unwrap();
    let remote = HookedRemote::new(MemoryRemoteCatalog::new());
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    *remote.on_list.lock().unwrap() = Some((entered_tx, release_rx));

    let engine = Arc::new(engine_with(&dir, FsLocalDirectory::new(), remote));

    let running = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.pull(Strategy::LastWriteWins))
    };
    entered_rx.recv().unwrap();
    assert_eq!(engine.state(), SyncState::Snapshotting);

    assert!(matches!(engine.push(Strategy::LastWriteWins), Err(SyncError::Busy)));
    assert!(matches!(engine.sync(Strategy::LastWriteWins), Err(SyncError::Busy)));

    release_tx.send(()).unwrap();
    let report = running.join().unwrap().unwrap();
    assert_eq!(report.status, PassStatus::Success);

    // Refused calls leave no trace in the log.
    assert_eq!(engine.catalog().log_len(), 1);
    // The guard is released once the pass ends.
    engine.push(Strategy::LastWriteWins).unwrap();
}

#[test]
fn cancelled_pass_records_partial_progress() {
    let dir = TempDir::new().unwrap();
    let inner = MemoryRemoteCatalog::new();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        inner.insert(name, name.as_bytes(), Timestamp::from_secs(1_600_000_000));
    }
    let engine = engine_with(&dir, FsLocalDirectory::new(), HookedRemote::new(inner));
    *engine.remote().on_fetch.lock().unwrap() = Some(engine.cancel_handle());

    let report = engine.sync(Strategy::LastWriteWins).unwrap();

    let pull = report.pull.unwrap();
    assert_eq!(pull.status, PassStatus::Cancelled);
    assert_eq!(pull.transferred, 1);
    assert_eq!(pull.skipped, 2);
    assert!(pull
        .items
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::Cancelled));
    assert!(report.push.is_none(), "push must not run after a cancelled pull");
    assert_eq!(engine.state(), SyncState::Cancelled);

    let entry = &engine.catalog().query_logs(1)[0];
    assert_eq!(entry.status, PassStatus::Cancelled);
    assert_eq!(engine.status().last_sync_time, None);

    // A fresh pass starts uncancelled and finishes the job.
    let resumed = engine.pull(Strategy::LastWriteWins).unwrap();
    assert_eq!(resumed.status, PassStatus::Success);
    assert_eq!(resumed.transferred, 2);
}

#[test]
fn unknown_local_mtime_falls_back_to_remote() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.jpg"), b"local").unwrap();
    set_mtime(&dir.path().join("a.jpg"), Timestamp::from_secs(1_900_000_000));

    let remote = MemoryRemoteCatalog::new();
    remote.insert("a.jpg", b"remote", Timestamp::from_secs(1_600_000_000));
    let local = FaultyLocal {
        unstattable: HashSet::from(["a.jpg".to_string()]),
        ..FaultyLocal::default()
    };
    let engine = engine_with(&dir, local, remote);

    let report = engine.pull(Strategy::LastWriteWins).unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(std::fs::read(dir.path().join("a.jpg")).unwrap(), b"remote");
}

#[test]
fn unreadable_local_file_keeps_the_remote_copy() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.jpg"), b"new").unwrap();
    set_mtime(&dir.path().join("a.jpg"), Timestamp::from_secs(1_700_000_000));

    let remote = MemoryRemoteCatalog::new();
    remote.insert("a.jpg", b"old", Timestamp::from_secs(1_600_000_000));
    let local = FaultyLocal {
        unreadable: HashSet::from(["a.jpg".to_string()]),
        ..FaultyLocal::default()
    };
    let engine = engine_with(&dir, local, remote);

    let report = engine.push(Strategy::LastWriteWins).unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.items.failed[0].action, SyncAction::ReplaceRemote);
    assert!(!report.items.failed[0].error.contains("removed"));
    assert_eq!(engine.remote().delete_calls(), 0);
    assert_eq!(engine.remote().bytes_of("a.jpg").unwrap(), b"old");
    assert_eq!(engine.status().remote_count, 1);
}

#[test]
fn failed_mtime_update_still_records_the_written_file() {
    let dir = TempDir::new().unwrap();
    let remote = MemoryRemoteCatalog::new();
    remote.insert("a.jpg", b"remote", Timestamp::from_secs(1_600_000_000));
    let local = FaultyLocal {
        frozen_mtime: HashSet::from(["a.jpg".to_string()]),
        ..FaultyLocal::default()
    };
    let engine = engine_with(&dir, local, remote);

    let report = engine.pull(Strategy::ServerAlwaysWins).unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(std::fs::read(dir.path().join("a.jpg")).unwrap(), b"remote");
    let recorded = engine.catalog().items(Replica::Local);
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].logical_name, "a.jpg");
    assert_eq!(recorded[0].modified_at, None);
    assert_eq!(engine.status().local_count, 1);
}

#[test]
fn panicking_transfer_leaves_the_engine_usable() {
    let dir = TempDir::new().unwrap();
    let remote = MemoryRemoteCatalog::new();
    remote.insert("a.jpg", b"remote", Timestamp::from_secs(1_600_000_000));
    let local = FaultyLocal {
        panic_on_write: AtomicBool::new(true),
        ..FaultyLocal::default()
    };
    let engine = engine_with(&dir, local, remote);

    let unwound = panic::catch_unwind(AssertUnwindSafe(|| engine.pull(Strategy::LastWriteWins)));
    assert!(unwound.is_err());
    assert_eq!(engine.state(), SyncState::Error);

    engine.local().panic_on_write.store(false, Ordering::SeqCst);
    let report = engine.pull(Strategy::LastWriteWins).unwrap();
    assert_eq!(report.transferred, 1);
    assert_eq!(engine.state(), SyncState::Synced);
}

#[test]
fn endless_listing_stops_at_reported_total() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(&dir, FsLocalDirectory::new(), EndlessRemote::default());

    let report = engine.pull(Strategy::ServerAlwaysWins).unwrap();

    assert_eq!(report.items.transferred, ["p1.jpg", "p2.jpg", "p3.jpg"]);
    assert_eq!(engine.remote().list_calls.load(Ordering::SeqCst), 3);
}
