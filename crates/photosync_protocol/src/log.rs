//! Sync event log schema.
//!
//! One [`SyncLogEntry`] is written per directional pass. Entries are
//! self-contained: they name every item that moved, failed or was skipped,
//! so no join against other records is needed to explain a pass.

use crate::error::ProtocolError;
use crate::strategy::Strategy;
use crate::types::{PassId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a half-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Remote → local.
    Pull,
    /// Local → remote.
    Push,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Pull => f.write_str("pull"),
            Direction::Push => f.write_str("push"),
        }
    }
}

impl FromStr for Direction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pull" => Ok(Direction::Pull),
            "push" => Ok(Direction::Push),
            _ => Err(ProtocolError::UnknownDirection(s.to_string())),
        }
    }
}

/// Final status of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    /// Every item was attempted. Individual items may still have failed.
    Success,
    /// The pass aborted before items could be applied.
    Failed,
    /// The pass stopped early on request.
    Cancelled,
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassStatus::Success => f.write_str("success"),
            PassStatus::Failed => f.write_str("failed"),
            PassStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A concrete per-item action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAction {
    /// Fetch a remote-only item into the local folder.
    Download,
    /// Replace local bytes with the winning remote version.
    OverwriteLocal,
    /// Remove a local-only file.
    DeleteLocal,
    /// Create a local-only item in the remote catalog.
    Upload,
    /// Delete and recreate a remote item from the winning local version.
    ReplaceRemote,
    /// Remove a remote-only record.
    DeleteRemote,
}

/// Which list of a log entry an action's successes land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionList {
    /// New on the receiving side.
    Transferred,
    /// Existing content replaced.
    Updated,
    /// Removed.
    Deleted,
}

impl SyncAction {
    /// Returns the direction this action belongs to.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            SyncAction::Download | SyncAction::OverwriteLocal | SyncAction::DeleteLocal => {
                Direction::Pull
            }
            SyncAction::Upload | SyncAction::ReplaceRemote | SyncAction::DeleteRemote => {
                Direction::Push
            }
        }
    }

    /// Returns the list a success is recorded in.
    #[must_use]
    pub const fn list(self) -> ActionList {
        match self {
            SyncAction::Download | SyncAction::Upload => ActionList::Transferred,
            SyncAction::OverwriteLocal | SyncAction::ReplaceRemote => ActionList::Updated,
            SyncAction::DeleteLocal | SyncAction::DeleteRemote => ActionList::Deleted,
        }
    }

    /// Tie-break rank when two actions are equally frequent. Lower wins.
    ///
    /// Deletions rank first so that an entry summarised by its primary
    /// action never hides data removal.
    const fn rank(self) -> u8 {
        match self {
            SyncAction::DeleteLocal | SyncAction::DeleteRemote => 0,
            SyncAction::OverwriteLocal | SyncAction::ReplaceRemote => 1,
            SyncAction::Download | SyncAction::Upload => 2,
        }
    }

    /// Picks the action that best summarises a pass: the most frequent
    /// successful action, ties broken by [`SyncAction::rank`].
    pub fn primary(actions: impl IntoIterator<Item = SyncAction>) -> Option<SyncAction> {
        let mut counts: Vec<(SyncAction, usize)> = Vec::new();
        for action in actions {
            match counts.iter_mut().find(|(a, _)| *a == action) {
                Some((_, n)) => *n += 1,
                None => counts.push((action, 1)),
            }
        }
        counts
            .into_iter()
            .min_by(|(a, an), (b, bn)| bn.cmp(an).then(a.rank().cmp(&b.rank())).then(a.cmp(b)))
            .map(|(action, _)| action)
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncAction::Download => "download",
            SyncAction::OverwriteLocal => "overwrite-local",
            SyncAction::DeleteLocal => "delete-local",
            SyncAction::Upload => "upload",
            SyncAction::ReplaceRemote => "replace-remote",
            SyncAction::DeleteRemote => "delete-remote",
        };
        f.write_str(s)
    }
}

/// Why an item was deliberately not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// One side's bytes failed validation.
    Corrupted,
    /// The logical name cannot be used as a local file name.
    InvalidName,
    /// The pass was cancelled before the item was reached.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Corrupted => f.write_str("corrupted"),
            SkipReason::InvalidName => f.write_str("invalid name"),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// An item whose action failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    /// Logical name.
    pub name: String,
    /// The action that was attempted.
    pub action: SyncAction,
    /// Error message from the adapter.
    pub error: String,
}

/// An item deliberately left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Logical name.
    pub name: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Per-item detail lists of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLists {
    /// Items newly created on the receiving side.
    pub transferred: Vec<String>,
    /// Items whose content was replaced.
    pub updated: Vec<String>,
    /// Items removed.
    pub deleted: Vec<String>,
    /// Items whose action failed.
    pub failed: Vec<FailedItem>,
    /// Items deliberately skipped.
    pub skipped: Vec<SkippedItem>,
}

impl ItemLists {
    /// Records a successful action.
    pub fn record_success(&mut self, action: SyncAction, name: impl Into<String>) {
        let name = name.into();
        match action.list() {
            ActionList::Transferred => self.transferred.push(name),
            ActionList::Updated => self.updated.push(name),
            ActionList::Deleted => self.deleted.push(name),
        }
    }

    /// Records a failed action.
    pub fn record_failure(
        &mut self,
        action: SyncAction,
        name: impl Into<String>,
        error: impl Into<String>,
    ) {
        self.failed.push(FailedItem {
            name: name.into(),
            action,
            error: error.into(),
        });
    }

    /// Records a skipped item.
    pub fn record_skip(&mut self, name: impl Into<String>, reason: SkipReason) {
        self.skipped.push(SkippedItem {
            name: name.into(),
            reason,
        });
    }

    /// Sorts every list by name so entries are independent of worker timing.
    pub fn sort(&mut self) {
        self.transferred.sort();
        self.updated.sort();
        self.deleted.sort();
        self.failed.sort_by(|a, b| a.name.cmp(&b.name));
        self.skipped.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Returns true if nothing moved.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.transferred.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Aggregate counts of a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassCounts {
    /// Items created on the receiving side.
    pub transferred: u32,
    /// Items whose content was replaced.
    pub updated: u32,
    /// Items removed.
    pub deleted: u32,
    /// Matched pairs with a real difference, whichever side won.
    pub conflicts_resolved: u32,
    /// Items whose action failed.
    pub failed: u32,
    /// Items deliberately skipped.
    pub skipped: u32,
}

impl PassCounts {
    fn from_lists(items: &ItemLists, conflicts_resolved: u32) -> Self {
        let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        Self {
            transferred: count(items.transferred.len()),
            updated: count(items.updated.len()),
            deleted: count(items.deleted.len()),
            conflicts_resolved,
            failed: count(items.failed.len()),
            skipped: count(items.skipped.len()),
        }
    }
}

/// An append-only audit record for one directional pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Invocation this pass belongs to.
    pub pass_id: PassId,
    /// Pull or push.
    pub direction: Direction,
    /// Strategy in effect.
    pub strategy: Strategy,
    /// When the pass started.
    pub started_at: Timestamp,
    /// When the entry was written.
    pub timestamp: Timestamp,
    /// Aggregate counts, consistent with `items`.
    pub counts: PassCounts,
    /// Per-item detail.
    pub items: ItemLists,
    /// Action that best summarises the pass, if anything moved.
    pub primary_action: Option<SyncAction>,
    /// Final status.
    pub status: PassStatus,
    /// Cause of a failed pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl SyncLogEntry {
    /// Builds an entry for a pass that reached the item phase.
    ///
    /// `actions` lists the successful actions, used to pick the primary one.
    /// Item lists are sorted and counts are derived from them.
    #[allow(clippy::too_many_arguments)]
    pub fn completed(
        pass_id: PassId,
        direction: Direction,
        strategy: Strategy,
        started_at: Timestamp,
        mut items: ItemLists,
        actions: impl IntoIterator<Item = SyncAction>,
        conflicts_resolved: u32,
        status: PassStatus,
    ) -> Self {
        items.sort();
        Self {
            pass_id,
            direction,
            strategy,
            started_at,
            timestamp: Timestamp::now(),
            counts: PassCounts::from_lists(&items, conflicts_resolved),
            items,
            primary_action: SyncAction::primary(actions),
            status,
            error_detail: None,
        }
    }

    /// Builds an entry for a pass that aborted.
    pub fn failed(
        pass_id: PassId,
        direction: Direction,
        strategy: Strategy,
        started_at: Timestamp,
        error_detail: impl Into<String>,
    ) -> Self {
        Self {
            pass_id,
            direction,
            strategy,
            started_at,
            timestamp: Timestamp::now(),
            counts: PassCounts::default(),
            items: ItemLists::default(),
            primary_action: None,
            status: PassStatus::Failed,
            error_detail: Some(error_detail.into()),
        }
    }

    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {} [{}]: {} transferred, {} updated, {} deleted, {} conflicts",
            self.direction,
            self.status,
            self.strategy,
            self.counts.transferred,
            self.counts.updated,
            self.counts.deleted,
            self.counts.conflicts_resolved,
        );
        if self.counts.failed > 0 {
            let names: Vec<&str> = self.items.failed.iter().map(|f| f.name.as_str()).collect();
            line.push_str(&format!(", {} failed ({})", self.counts.failed, names.join(", ")));
        }
        if self.counts.skipped > 0 {
            line.push_str(&format!(", {} skipped", self.counts.skipped));
        }
        if let Some(detail) = &self.error_detail {
            line.push_str(&format!(": {detail}"));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_lands_in_matching_list() {
        let mut items = ItemLists::default();
        items.record_success(SyncAction::Download, "a.jpg");
        items.record_success(SyncAction::Upload, "b.jpg");
        items.record_success(SyncAction::OverwriteLocal, "c.jpg");
        items.record_success(SyncAction::ReplaceRemote, "d.jpg");
        items.record_success(SyncAction::DeleteLocal, "e.jpg");
        items.record_success(SyncAction::DeleteRemote, "f.jpg");

        assert_eq!(items.transferred, ["a.jpg", "b.jpg"]);
        assert_eq!(items.updated, ["c.jpg", "d.jpg"]);
        assert_eq!(items.deleted, ["e.jpg", "f.jpg"]);
    }

    #[test]
    fn primary_action_prefers_frequency_then_deletion() {
        use SyncAction::*;
        assert_eq!(SyncAction::primary(std::iter::empty()), None);
        assert_eq!(SyncAction::primary([Download, Download, DeleteLocal]), Some(Download));
        assert_eq!(SyncAction::primary([Download, DeleteLocal]), Some(DeleteLocal));
        assert_eq!(SyncAction::primary([Download, OverwriteLocal]), Some(OverwriteLocal));
    }

    #[test]
    fn action_directions() {
        assert_eq!(SyncAction::Download.direction(), Direction::Pull);
        assert_eq!(SyncAction::DeleteLocal.direction(), Direction::Pull);
        assert_eq!(SyncAction::ReplaceRemote.direction(), Direction::Push);
        assert_eq!(SyncAction::DeleteRemote.direction(), Direction::Push);
    }

    #[test]
    fn completed_entry_counts_and_sorts() {
        let mut items = ItemLists::default();
        items.record_success(SyncAction::Download, "b.png");
        items.record_success(SyncAction::Download, "a.jpg");
        items.record_failure(SyncAction::Download, "c.gif", "connection reset");
        items.record_skip("d.jpg", SkipReason::Corrupted);

        let entry = SyncLogEntry::completed(
            PassId::generate(),
            Direction::Pull,
            Strategy::ServerAlwaysWins,
            Timestamp::from_secs(1),
            items,
            [SyncAction::Download, SyncAction::Download],
            0,
            PassStatus::Success,
        );

        assert_eq!(entry.items.transferred, ["a.jpg", "b.png"]);
        assert_eq!(entry.counts.transferred, 2);
        assert_eq!(entry.counts.failed, 1);
        assert_eq!(entry.counts.skipped, 1);
        assert_eq!(entry.primary_action, Some(SyncAction::Download));
        assert!(entry.summary().contains("1 failed (c.gif)"));
    }

    #[test]
    fn failed_entry_carries_detail() {
        let entry = SyncLogEntry::failed(
            PassId::generate(),
            Direction::Push,
            Strategy::LocalAlwaysWins,
            Timestamp::from_secs(1),
            "remote unreachable",
        );
        assert_eq!(entry.status, PassStatus::Failed);
        assert_eq!(entry.counts, PassCounts::default());
        assert!(entry.summary().ends_with(": remote unreachable"));
    }

    #[test]
    fn entry_json_shape() {
        let entry = SyncLogEntry::failed(
            PassId::generate(),
            Direction::Pull,
            Strategy::LastWriteWins,
            Timestamp::from_secs(2),
            "boom",
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["direction"], "pull");
        assert_eq!(json["strategy"], "last-write-wins");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["started_at"], 2000);
    }

    #[test]
    fn direction_parsing() {
        assert_eq!("PULL".parse::<Direction>().unwrap(), Direction::Pull);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
