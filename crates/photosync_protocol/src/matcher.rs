//! Pairing of local and remote items by logical name.
//!
//! The key is the display name compared by exact byte equality: no case
//! folding and no Unicode normalization. `Photo.JPG` and `photo.jpg` are two
//! different items. A rename on either side therefore shows up as one
//! one-sided item disappearing and another appearing.

use crate::item::{Item, ReplicaSnapshot};
use std::collections::BTreeMap;

/// Classification of one logical name across the two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// Present only in the local snapshot.
    OnlyLocal(Item),
    /// Present only in the remote snapshot.
    OnlyRemote(Item),
    /// Present in both snapshots.
    Both {
        /// The local record.
        local: Item,
        /// The remote record.
        remote: Item,
    },
}

impl MatchResult {
    /// Returns the logical name this match is about.
    #[must_use]
    pub fn logical_name(&self) -> &str {
        match self {
            MatchResult::OnlyLocal(item) | MatchResult::OnlyRemote(item) => &item.logical_name,
            MatchResult::Both { local, .. } => &local.logical_name,
        }
    }
}

/// Matches two snapshots.
///
/// Returns one result per distinct logical name, ordered by name.
#[must_use]
pub fn match_snapshots(local: &ReplicaSnapshot, remote: &ReplicaSnapshot) -> Vec<MatchResult> {
    let mut slots: BTreeMap<&str, (Option<&Item>, Option<&Item>)> = BTreeMap::new();

    for item in local.items() {
        slots.entry(item.logical_name.as_str()).or_default().0 = Some(item);
    }
    for item in remote.items() {
        slots.entry(item.logical_name.as_str()).or_default().1 = Some(item);
    }

    slots
        .into_values()
        .filter_map(|slot| match slot {
            (Some(l), Some(r)) => Some(MatchResult::Both {
                local: l.clone(),
                remote: r.clone(),
            }),
            (Some(l), None) => Some(MatchResult::OnlyLocal(l.clone())),
            (None, Some(r)) => Some(MatchResult::OnlyRemote(r.clone())),
            (None, None) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Replica;
    use crate::types::Timestamp;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn local(name: &str) -> Item {
        Item::local(name, 1, Some(Timestamp::from_secs(1)))
    }

    fn remote(name: &str) -> Item {
        Item::remote(format!("id-{name}"), name, format!("stored-{name}"), 1, Timestamp::from_secs(1))
    }

    #[test]
    fn classifies_all_three_kinds() {
        let l = ReplicaSnapshot::new(Replica::Local, vec![local("a.jpg"), local("both.png")]);
        let r = ReplicaSnapshot::new(Replica::Remote, vec![remote("both.png"), remote("z.gif")]);

        let results = match_snapshots(&l, &r);
        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0], MatchResult::OnlyLocal(i) if i.logical_name == "a.jpg"));
        assert!(matches!(
            &results[1],
            MatchResult::Both { local, remote }
                if local.logical_name == "both.png" && remote.remote_id.as_deref() == Some("id-both.png")
        ));
        assert!(matches!(&results[2], MatchResult::OnlyRemote(i) if i.logical_name == "z.gif"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let l = ReplicaSnapshot::new(Replica::Local, vec![local("Photo.JPG")]);
        let r = ReplicaSnapshot::new(Replica::Remote, vec![remote("photo.jpg")]);

        let results = match_snapshots(&l, &r);
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|m| !matches!(m, MatchResult::Both { .. })));
    }

    #[test]
    fn matches_on_display_name_not_storage_name() {
        let l = ReplicaSnapshot::new(Replica::Local, vec![local("cat.jpg")]);
        let r = ReplicaSnapshot::new(
            Replica::Remote,
            vec![Item::remote("9", "cat.jpg", "5f1c9a.jpg", 1, Timestamp::from_secs(1))],
        );

        let results = match_snapshots(&l, &r);
        assert!(matches!(results.as_slice(), [MatchResult::Both { .. }]));
    }

    #[test]
    fn empty_snapshots() {
        let l = ReplicaSnapshot::empty(Replica::Local);
        let r = ReplicaSnapshot::empty(Replica::Remote);
        assert!(match_snapshots(&l, &r).is_empty());
    }

    proptest! {
        #[test]
        fn every_name_classified_once(
            local_names in proptest::collection::btree_set("[a-d]{1,3}\\.jpg", 0..12),
            remote_names in proptest::collection::btree_set("[a-d]{1,3}\\.jpg", 0..12),
        ) {
            let l = ReplicaSnapshot::new(Replica::Local, local_names.iter().map(|n| local(n)));
            let r = ReplicaSnapshot::new(Replica::Remote, remote_names.iter().map(|n| remote(n)));
            let results = match_snapshots(&l, &r);

            let union: BTreeSet<&String> = local_names.union(&remote_names).collect();
            prop_assert_eq!(results.len(), union.len());

            for m in &results {
                let name = m.logical_name().to_string();
                match m {
                    MatchResult::Both { .. } => {
                        prop_assert!(local_names.contains(&name) && remote_names.contains(&name));
                    }
                    MatchResult::OnlyLocal(_) => {
                        prop_assert!(local_names.contains(&name) && !remote_names.contains(&name));
                    }
                    MatchResult::OnlyRemote(_) => {
                        prop_assert!(!local_names.contains(&name) && remote_names.contains(&name));
                    }
                }
            }

            let names: Vec<&str> = results.iter().map(MatchResult::logical_name).collect();
            let mut sorted = names.clone();
            sorted.sort_unstable();
            prop_assert_eq!(names, sorted);
        }
    }
}
