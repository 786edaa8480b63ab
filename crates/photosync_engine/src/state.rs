//! Engine state and cumulative statistics.

use photosync_protocol::{PassStatus, SyncLogEntry, Timestamp};
use serde::Serialize;
use std::fmt;

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No pass has run yet.
    Idle,
    /// Enumerating both replicas.
    Snapshotting,
    /// Applying remote changes to the local folder.
    Pulling,
    /// Applying local changes to the remote catalog.
    Pushing,
    /// The last pass completed.
    Synced,
    /// The last pass aborted.
    Error,
    /// The last pass was cancelled.
    Cancelled,
}

impl SyncState {
    /// Returns true while a pass is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Snapshotting | SyncState::Pulling | SyncState::Pushing
        )
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::Snapshotting => "snapshotting",
            SyncState::Pulling => "pulling",
            SyncState::Pushing => "pushing",
            SyncState::Synced => "synced",
            SyncState::Error => "error",
            SyncState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Statistics accumulated over the engine's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Passes that reached the item phase, including cancelled ones.
    pub passes_completed: u64,
    /// Passes that aborted.
    pub passes_failed: u64,
    /// Items created on the receiving side.
    pub items_transferred: u64,
    /// Items whose content was replaced.
    pub items_updated: u64,
    /// Items removed.
    pub items_deleted: u64,
    /// Per-item failures.
    pub items_failed: u64,
    /// Conflicting pairs seen.
    pub conflicts_resolved: u64,
    /// Remote listing retries.
    pub retries: u64,
    /// End of the last successful pass.
    pub last_sync_time: Option<Timestamp>,
    /// Message of the last pass-level error.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record_entry(&mut self, entry: &SyncLogEntry) {
        match entry.status {
            PassStatus::Failed => {
                self.passes_failed += 1;
                self.last_error = entry.error_detail.clone();
                return;
            }
            PassStatus::Success => {
                self.last_sync_time = Some(entry.timestamp);
                self.last_error = None;
            }
            PassStatus::Cancelled => {}
        }

        let counts = &entry.counts;
        self.passes_completed += 1;
        self.items_transferred += u64::from(counts.transferred);
        self.items_updated += u64::from(counts.updated);
        self.items_deleted += u64::from(counts.deleted);
        self.items_failed += u64::from(counts.failed);
        self.conflicts_resolved += u64::from(counts.conflicts_resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photosync_protocol::{Direction, ItemLists, PassId, Strategy, SyncAction};

    #[test]
    fn state_checks() {
        for idle in [
            SyncState::Idle,
            SyncState::Synced,
            SyncState::Error,
            SyncState::Cancelled,
        ] {
            assert!(!idle.is_active());
        }
        assert!(SyncState::Snapshotting.is_active());
        assert!(SyncState::Pulling.is_active());
        assert!(SyncState::Pushing.is_active());
        assert_eq!(SyncState::Pulling.to_string(), "pulling");
    }

    #[test]
    fn stats_follow_entries() {
        let mut stats = SyncStats::default();

        let mut items = ItemLists::default();
        items.record_success(SyncAction::Download, "a.jpg");
        items.record_failure(SyncAction::Download, "b.jpg", "boom");
        let ok = SyncLogEntry::completed(
            PassId::generate(),
            Direction::Pull,
            Strategy::LastWriteWins,
            Timestamp::now(),
            items,
            [SyncAction::Download],
            1,
            PassStatus::Success,
        );
        stats.record_entry(&ok);

        let failed = SyncLogEntry::failed(
            PassId::generate(),
            Direction::Push,
            Strategy::LastWriteWins,
            Timestamp::now(),
            "remote unreachable",
        );
        stats.record_entry(&failed);

        assert_eq!(stats.passes_completed, 1);
        assert_eq!(stats.passes_failed, 1);
        assert_eq!(stats.items_transferred, 1);
        assert_eq!(stats.items_failed, 1);
        assert_eq!(stats.conflicts_resolved, 1);
        assert_eq!(stats.last_sync_time, Some(ok.timestamp));
        assert_eq!(stats.last_error.as_deref(), Some("remote unreachable"));
    }
}
