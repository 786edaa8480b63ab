//! Items and replica snapshots.

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One of the two replicas being kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Replica {
    /// The user's local folder.
    Local,
    /// The server-side catalog.
    Remote,
}

impl Replica {
    /// Returns the opposite replica.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Replica::Local => Replica::Remote,
            Replica::Remote => Replica::Local,
        }
    }
}

impl fmt::Display for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replica::Local => f.write_str("local"),
            Replica::Remote => f.write_str("remote"),
        }
    }
}

/// A logical image known to one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Display name; the identity used for matching across replicas.
    pub logical_name: String,
    /// On-disk or catalog file name. May carry uniqueness suffixes.
    pub storage_name: String,
    /// Remote record id. Always set for remote items, never for local ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time, or `None` when it could not be read.
    pub modified_at: Option<Timestamp>,
    /// Whether the bytes failed validation.
    #[serde(default)]
    pub corrupted: bool,
    /// Replica this record was read from.
    pub source: Replica,
}

impl Item {
    /// Creates a local item. Local files are stored under their display name.
    pub fn local(name: impl Into<String>, size_bytes: u64, modified_at: Option<Timestamp>) -> Self {
        let name = name.into();
        Self {
            storage_name: name.clone(),
            logical_name: name,
            remote_id: None,
            size_bytes,
            modified_at,
            corrupted: false,
            source: Replica::Local,
        }
    }

    /// Creates a remote item.
    pub fn remote(
        id: impl Into<String>,
        logical_name: impl Into<String>,
        storage_name: impl Into<String>,
        size_bytes: u64,
        modified_at: Timestamp,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            storage_name: storage_name.into(),
            remote_id: Some(id.into()),
            size_bytes,
            modified_at: Some(modified_at),
            corrupted: false,
            source: Replica::Remote,
        }
    }

    /// Sets the corruption flag.
    #[must_use]
    pub fn with_corrupted(mut self, corrupted: bool) -> Self {
        self.corrupted = corrupted;
        self
    }

    /// Returns true if both records carry the same size and timestamp
    /// once timestamps are truncated to `granularity_ms`.
    ///
    /// An unknown timestamp on either side is never equivalent.
    #[must_use]
    pub fn is_equivalent(&self, other: &Item, granularity_ms: u64) -> bool {
        match (self.modified_at, other.modified_at) {
            (Some(a), Some(b)) => {
                self.size_bytes == other.size_bytes
                    && a.truncate(granularity_ms) == b.truncate(granularity_ms)
            }
            _ => false,
        }
    }

    /// Validates the logical name for use as a single path component in the
    /// local folder.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidName`] for empty names, names with path
    /// separators or NUL bytes, `.`/`..`, and hidden (dot-prefixed) names.
    pub fn checked_file_name(&self) -> ProtocolResult<&str> {
        let name = self.logical_name.as_str();
        let reason = if name.is_empty() {
            Some("empty name")
        } else if name == "." || name == ".." {
            Some("relative path component")
        } else if name.contains(['/', '\\', '\0']) {
            Some("contains a path separator")
        } else if name.starts_with('.') {
            Some("hidden file name")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ProtocolError::InvalidName {
                name: name.to_string(),
                reason,
            }),
            None => Ok(name),
        }
    }
}

/// The enumerated state of one replica at the start of a pass.
///
/// Snapshots are immutable once captured. Logical names are unique within a
/// snapshot: duplicates are dropped at construction (first occurrence wins)
/// and reported through [`ReplicaSnapshot::duplicates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSnapshot {
    replica: Replica,
    items: Vec<Item>,
    duplicates: Vec<String>,
    captured_at: Timestamp,
}

impl ReplicaSnapshot {
    /// Builds a snapshot from enumerated items, in enumeration order.
    pub fn new(replica: Replica, items: impl IntoIterator<Item = Item>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut duplicates = Vec::new();

        for item in items {
            if seen.insert(item.logical_name.clone()) {
                kept.push(item);
            } else {
                duplicates.push(item.logical_name);
            }
        }

        Self {
            replica,
            items: kept,
            duplicates,
            captured_at: Timestamp::now(),
        }
    }

    /// Creates an empty snapshot.
    #[must_use]
    pub fn empty(replica: Replica) -> Self {
        Self::new(replica, Vec::new())
    }

    /// Returns the replica this snapshot describes.
    #[must_use]
    pub fn replica(&self) -> Replica {
        self.replica
    }

    /// Returns the items in enumeration order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns logical names that appeared more than once and were dropped.
    #[must_use]
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Returns when the snapshot was captured.
    #[must_use]
    pub fn captured_at(&self) -> Timestamp {
        self.captured_at
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the snapshot holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consumes the snapshot and returns its items.
    #[must_use]
    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}
