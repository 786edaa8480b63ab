//! Property-based test generators using proptest.

use photosync_protocol::{Item, Replica, ReplicaSnapshot, Strategy as SyncStrategy, Timestamp};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// A file to seed a library with: bytes and mtime in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFile {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Modification time in seconds since the epoch.
    pub mtime_secs: u64,
}

/// Strategy for generating valid display names.
pub fn display_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_-]{0,11}\\.(jpg|png|webp)").expect("Invalid regex")
}

/// Strategy for generating timestamps with whole-second precision.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (1_000_000_000u64..2_000_000_000).prop_map(Timestamp::from_secs)
}

/// Strategy for generating any sync strategy.
pub fn sync_strategy() -> impl Strategy<Value = SyncStrategy> {
    prop::sample::select(SyncStrategy::ALL.to_vec())
}

/// Strategy for generating an item of one replica.
pub fn item_strategy(replica: Replica) -> impl Strategy<Value = Item> {
    (
        display_name_strategy(),
        0u64..10_000,
        prop::option::weighted(0.9, timestamp_strategy()),
        prop::bool::weighted(0.1),
        any::<u16>(),
    )
        .prop_map(move |(name, size, mtime, corrupted, id)| match replica {
            Replica::Local => Item::local(name, size, mtime),
            Replica::Remote => Item::remote(
                id.to_string(),
                name.clone(),
                name,
                size,
                mtime.unwrap_or(Timestamp::from_secs(1)),
            )
            .with_corrupted(corrupted),
        })
}

/// Strategy for generating a snapshot. Names may repeat.
pub fn snapshot_strategy(replica: Replica) -> impl Strategy<Value = ReplicaSnapshot> {
    prop::collection::vec(item_strategy(replica), 0..12)
        .prop_map(move |items| ReplicaSnapshot::new(replica, items))
}

/// Names shared by [`library_strategy`], so two generated libraries overlap.
pub const NAME_POOL: [&str; 6] = ["a.jpg", "b.png", "c.webp", "d.jpg", "e.png", "f.jpg"];

/// Strategy for generating a library: names from [`NAME_POOL`] with contents
/// and mtimes.
pub fn library_strategy() -> impl Strategy<Value = BTreeMap<String, SeedFile>> {
    prop::collection::btree_map(
        prop::sample::select(NAME_POOL.to_vec()).prop_map(String::from),
        (
            prop::collection::vec(any::<u8>(), 0..64),
            1_000_000_000u64..2_000_000_000,
        )
            .prop_map(|(bytes, mtime_secs)| SeedFile { bytes, mtime_secs }),
        0..6,
    )
}
