//! The sync orchestrator.

use crate::config::SyncConfig;
use crate::error::{RemoteResult, SyncError, SyncResult};
use crate::executor::{Effect, Executor, ItemOutcome, Outcome};
use crate::local::LocalDirectory;
use crate::plan::plan_pass;
use crate::remote::{PageRequest, RemoteCatalog};
use crate::state::{SyncState, SyncStats};
use parking_lot::RwLock;
use photosync_catalog::{CatalogStatus, CatalogStore};
use photosync_protocol::{
    match_snapshots, Direction, Item, ItemLists, PassId, PassStatus, Replica, ReplicaSnapshot,
    Resolver, SkipReason, Strategy, SyncAction, SyncLogEntry, Timestamp,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one directional pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Invocation the pass belonged to.
    pub pass_id: PassId,
    /// Pull or push.
    pub direction: Direction,
    /// Success or Cancelled. Failed passes are reported as errors instead.
    pub status: PassStatus,
    /// Items created on the receiving side.
    pub transferred: u32,
    /// Items whose content was replaced.
    pub updated: u32,
    /// Items removed.
    pub deleted: u32,
    /// Matched pairs with a real difference.
    pub conflicts_resolved: u32,
    /// Items whose action failed.
    pub failed: u32,
    /// Items deliberately skipped.
    pub skipped: u32,
    /// Action that best summarises the pass.
    pub primary_action: Option<SyncAction>,
    /// Per-item detail, sorted by name.
    pub items: ItemLists,
}

impl PassReport {
    fn from_entry(entry: &SyncLogEntry) -> Self {
        Self {
            pass_id: entry.pass_id,
            direction: entry.direction,
            status: entry.status,
            transferred: entry.counts.transferred,
            updated: entry.counts.updated,
            deleted: entry.counts.deleted,
            conflicts_resolved: entry.counts.conflicts_resolved,
            failed: entry.counts.failed,
            skipped: entry.counts.skipped,
            primary_action: entry.primary_action,
            items: entry.items.clone(),
        }
    }

    /// Returns true if nothing moved in either direction of this pass.
    pub fn is_noop(&self) -> bool {
        self.transferred == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Outcome of a combined sync. A half is `None` when the strategy does not
/// run it, or when the pull half was cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// The pull half.
    pub pull: Option<PassReport>,
    /// The push half.
    pub push: Option<PassReport>,
}

/// Cancels the running pass from another thread.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Requests cancellation. Items already started finish; the rest are
    /// skipped.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Releases the busy flag when a pass ends, however it ends. A pass that
/// unwinds while still active leaves the engine in `Error`.
struct PassGuard<'a> {
    running: &'a AtomicBool,
    state: &'a RwLock<SyncState>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.state.write();
            if state.is_active() {
                *state = SyncState::Error;
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Reconciles a local folder with a remote catalog.
///
/// Each pass snapshots both replicas, matches them by display name, resolves
/// conflicts under the given [`Strategy`], applies the resulting actions and
/// appends one [`SyncLogEntry`] to the catalog.
///
/// One pass runs at a time per engine; concurrent calls fail with
/// [`SyncError::Busy`].
pub struct SyncEngine<L: LocalDirectory, R: RemoteCatalog> {
    config: SyncConfig,
    local: L,
    remote: R,
    catalog: Arc<CatalogStore>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    running: AtomicBool,
    cancelled: Arc<AtomicBool>,
}

impl<L: LocalDirectory, R: RemoteCatalog> SyncEngine<L, R> {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the configuration is invalid.
    pub fn new(
        config: SyncConfig,
        local: L,
        remote: R,
        catalog: Arc<CatalogStore>,
    ) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            local,
            remote,
            catalog,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            running: AtomicBool::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the catalog store.
    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    /// Returns the local folder adapter.
    pub fn local(&self) -> &L {
        &self.local
    }

    /// Returns the remote adapter.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the cumulative stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns a handle that cancels the running pass.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    /// Cancels the running pass, if any.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns item counts and the last successful sync time.
    pub fn status(&self) -> CatalogStatus {
        self.catalog.query_status()
    }

    /// Applies remote state to the local folder.
    ///
    /// # Errors
    ///
    /// Returns an error if another pass is running, the configuration is
    /// invalid, a snapshot cannot be taken or the log entry cannot be
    /// written. Per-item failures are reported in the returned report.
    pub fn pull(&self, strategy: Strategy) -> SyncResult<PassReport> {
        let _guard = self.begin()?;
        self.run_pass(PassId::generate(), Direction::Pull, strategy)
    }

    /// Applies local state to the remote catalog.
    ///
    /// # Errors
    ///
    /// Same conditions as [`pull`](Self::pull).
    pub fn push(&self, strategy: Strategy) -> SyncResult<PassReport> {
        let _guard = self.begin()?;
        self.run_pass(PassId::generate(), Direction::Push, strategy)
    }

    /// Runs the passes `strategy` calls for: pull then push for
    /// last-write-wins, pull only for server-always-wins, push only for
    /// local-always-wins. Both halves share one pass id.
    ///
    /// # Errors
    ///
    /// Returns the first pass error. A failed pull prevents the push.
    pub fn sync(&self, strategy: Strategy) -> SyncResult<SyncReport> {
        let _guard = self.begin()?;
        let pass_id = PassId::generate();
        let mut report = SyncReport::default();

        if strategy.runs_pull() {
            let pull = self.run_pass(pass_id, Direction::Pull, strategy)?;
            let cancelled = pull.status == PassStatus::Cancelled;
            report.pull = Some(pull);
            if cancelled {
                return Ok(report);
            }
        }
        if strategy.runs_push() {
            report.push = Some(self.run_pass(pass_id, Direction::Push, strategy)?);
        }
        Ok(report)
    }

    fn begin(&self) -> SyncResult<PassGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::Busy);
        }
        self.cancelled.store(false, Ordering::SeqCst);
        Ok(PassGuard {
            running: &self.running,
            state: &self.state,
        })
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    fn run_pass(
        &self,
        pass_id: PassId,
        direction: Direction,
        strategy: Strategy,
    ) -> SyncResult<PassReport> {
        // Configuration problems abort before any I/O and leave no log entry.
        self.config.validate()?;

        let start = Instant::now();
        let started_at = Timestamp::now();
        info!(%pass_id, %direction, %strategy, "sync pass started");

        self.set_state(SyncState::Snapshotting);
        let (local, remote) = match self.snapshot() {
            Ok(snapshots) => snapshots,
            Err(e) => return Err(self.fail_pass(pass_id, direction, strategy, started_at, e)),
        };

        let resolver = Resolver::new(strategy).with_granularity_ms(self.config.granularity_ms);
        let matches = match_snapshots(&local, &remote);
        let plan = plan_pass(direction, &resolver, &matches);
        debug!(
            %pass_id,
            matched = matches.len(),
            planned = plan.steps.len(),
            skipped = plan.skipped.len(),
            "pass planned"
        );

        self.set_state(match direction {
            Direction::Pull => SyncState::Pulling,
            Direction::Push => SyncState::Pushing,
        });
        let executor = Executor {
            local: &self.local,
            remote: &self.remote,
            folder: self.config.sync_folder(),
            cancelled: &self.cancelled,
            workers: self.config.max_parallel_transfers,
        };
        let outcomes = executor.run(plan.steps);

        let mut items = ItemLists::default();
        let mut succeeded = Vec::new();
        let mut cancelled = false;
        for skip in plan.skipped {
            items.record_skip(skip.name, skip.reason);
        }
        for outcome in &outcomes {
            match &outcome.outcome {
                Outcome::Done(_) => {
                    items.record_success(outcome.action, outcome.name.clone());
                    succeeded.push(outcome.action);
                }
                Outcome::Failed { error, .. } => {
                    items.record_failure(outcome.action, outcome.name.clone(), error.clone());
                }
                Outcome::Skipped(reason) => {
                    cancelled |= *reason == SkipReason::Cancelled;
                    items.record_skip(outcome.name.clone(), *reason);
                }
            }
        }

        let status = if cancelled {
            PassStatus::Cancelled
        } else {
            PassStatus::Success
        };
        let entry = SyncLogEntry::completed(
            pass_id,
            direction,
            strategy,
            started_at,
            items,
            succeeded,
            plan.conflicts,
            status,
        );

        if let Err(e) = self.catalog.append_sync_log(&entry) {
            self.set_state(SyncState::Error);
            self.stats.write().last_error = Some(e.to_string());
            return Err(e.into());
        }
        self.record_post_pass_view(local, remote, &outcomes);
        self.stats.write().record_entry(&entry);
        self.set_state(if cancelled {
            SyncState::Cancelled
        } else {
            SyncState::Synced
        });

        info!(
            %pass_id,
            %direction,
            status = %entry.status,
            transferred = entry.counts.transferred,
            updated = entry.counts.updated,
            deleted = entry.counts.deleted,
            conflicts = entry.counts.conflicts_resolved,
            failed = entry.counts.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sync pass finished"
        );
        Ok(PassReport::from_entry(&entry))
    }

    /// Writes a `Failed` entry for a pass that could not reach the item
    /// phase and hands back the cause.
    fn fail_pass(
        &self,
        pass_id: PassId,
        direction: Direction,
        strategy: Strategy,
        started_at: Timestamp,
        error: SyncError,
    ) -> SyncError {
        warn!(%pass_id, %direction, error = %error, "sync pass failed");
        self.set_state(SyncState::Error);

        let entry = SyncLogEntry::failed(pass_id, direction, strategy, started_at, error.to_string());
        if let Err(log_err) = self.catalog.append_sync_log(&entry) {
            warn!(%pass_id, error = %log_err, "could not record failed pass");
        }
        self.stats.write().record_entry(&entry);
        error
    }

    /// Captures both replicas, remote first.
    fn snapshot(&self) -> SyncResult<(ReplicaSnapshot, ReplicaSnapshot)> {
        let remote = ReplicaSnapshot::new(Replica::Remote, self.list_remote()?);
        let local = ReplicaSnapshot::new(Replica::Local, self.list_local()?);

        for snapshot in [&local, &remote] {
            for name in snapshot.duplicates() {
                warn!(replica = %snapshot.replica(), %name, "duplicate display name, keeping first");
            }
        }
        Ok((local, remote))
    }

    fn list_remote(&self) -> SyncResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut request = PageRequest::first(self.config.page_size);
        loop {
            let page = self.with_retry(|| self.remote.list_items(request))?;
            let received = page.items.len();
            let total = page.pagination.total;
            items.extend(page.items);
            if !page.pagination.has_more || received == 0 {
                break;
            }
            // Some servers keep answering with `hasMore` set; the reported
            // total bounds the listing.
            if items.len() as u64 >= total {
                warn!(
                    total,
                    fetched = items.len(),
                    page = request.page,
                    "listing reached reported total, stopping"
                );
                break;
            }
            let next = request.next();
            if next == request {
                break;
            }
            request = next;
        }
        Ok(items)
    }

    fn list_local(&self) -> SyncResult<Vec<Item>> {
        let folder = self.config.sync_folder();
        let names = self.local.list(folder)?;

        Ok(names
            .into_iter()
            .filter(|name| !name.starts_with('.'))
            .map(|name| match self.local.stat(&folder.join(&name)) {
                Ok(stat) => Item::local(name, stat.size, stat.modified_at),
                Err(e) => {
                    warn!(%name, error = %e, "cannot stat local file");
                    Item::local(name, 0, None)
                }
            })
            .collect())
    }

    fn with_retry<T>(&self, mut call: impl FnMut() -> RemoteResult<T>) -> SyncResult<T> {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry.allows_retry_after(attempt) => {
                    attempt += 1;
                    let delay = retry.delay_for_attempt(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying remote listing");
                    self.stats.write().retries += 1;
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Stores what each replica holds after the pass: the snapshot with every
    /// successful action applied, plus the changes partially failed actions
    /// already made.
    fn record_post_pass_view(
        &self,
        local: ReplicaSnapshot,
        remote: ReplicaSnapshot,
        outcomes: &[ItemOutcome],
    ) {
        let by_name = |snapshot: ReplicaSnapshot| -> BTreeMap<String, Item> {
            snapshot
                .into_items()
                .into_iter()
                .map(|i| (i.logical_name.clone(), i))
                .collect()
        };
        let mut views = [by_name(local), by_name(remote)];
        let slot = |replica: Replica| match replica {
            Replica::Local => 0,
            Replica::Remote => 1,
        };

        for outcome in outcomes {
            let effect = match &outcome.outcome {
                Outcome::Done(effect) => effect,
                Outcome::Failed {
                    applied: Some(effect),
                    ..
                } => effect,
                Outcome::Failed { applied: None, .. } | Outcome::Skipped(_) => continue,
            };
            match effect {
                Effect::Put(replica, item) => {
                    views[slot(*replica)].insert(outcome.name.clone(), item.clone());
                }
                Effect::Remove(replica) => {
                    views[slot(*replica)].remove(&outcome.name);
                }
            }
        }

        let [local_view, remote_view] = views;
        for (replica, view) in [(Replica::Local, local_view), (Replica::Remote, remote_view)] {
            let items: Vec<Item> = view.into_values().collect();
            if let Err(e) = self.catalog.record_items(replica, &items) {
                warn!(%replica, error = %e, "could not record item view");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::FsLocalDirectory;
    use crate::remote::MemoryRemoteCatalog;
    use tempfile::tempdir;

    fn engine(folder: &std::path::Path) -> SyncEngine<FsLocalDirectory, MemoryRemoteCatalog> {
        SyncEngine::new(
            SyncConfig::new(folder),
            FsLocalDirectory::new(),
            MemoryRemoteCatalog::new(),
            Arc::new(CatalogStore::in_memory()),
        )
        .unwrap()
    }

    #[test]
    fn new_validates_config() {
        let result = SyncEngine::new(
            SyncConfig::new(""),
            FsLocalDirectory::new(),
            MemoryRemoteCatalog::new(),
            Arc::new(CatalogStore::in_memory()),
        );
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn initial_state() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.stats(), SyncStats::default());
        assert_eq!(engine.status().local_count, 0);
    }

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());

        let guard = engine.begin().unwrap();
        assert!(matches!(engine.begin(), Err(SyncError::Busy)));
        drop(guard);
        assert!(engine.begin().is_ok());
    }

    #[test]
    fn guard_clears_a_state_left_active() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());

        let guard = engine.begin().unwrap();
        engine.set_state(SyncState::Pulling);
        drop(guard);
        assert_eq!(engine.state(), SyncState::Error);

        let guard = engine.begin().unwrap();
        engine.set_state(SyncState::Synced);
        drop(guard);
        assert_eq!(engine.state(), SyncState::Synced);
    }

    #[test]
    fn cancel_before_a_pass_is_cleared() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        engine.remote().insert("a.jpg", b"a", Timestamp::from_secs(1_600_000_000));

        engine.cancel();
        let report = engine.pull(Strategy::ServerAlwaysWins).unwrap();
        assert_eq!(report.status, PassStatus::Success);
        assert_eq!(report.transferred, 1);
    }

    #[test]
    fn empty_pass_is_logged() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());

        let report = engine.push(Strategy::LastWriteWins).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.primary_action, None);
        assert_eq!(engine.catalog().log_len(), 1);
        assert_eq!(engine.state(), SyncState::Synced);
    }
}
