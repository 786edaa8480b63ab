//! Any starting state converges in one sync, after which sync moves nothing.

use photosync_protocol::Timestamp;
use photosync_testkit::{library_strategy, sync_strategy, TestBed};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn second_sync_is_a_noop(
        local in library_strategy(),
        remote in library_strategy(),
        strategy in sync_strategy(),
    ) {
        let bed = TestBed::new();
        for (name, file) in &local {
            bed.write_local(name, &file.bytes, file.mtime_secs);
        }
        for (name, file) in &remote {
            bed.remote().insert(name, &file.bytes, Timestamp::from_secs(file.mtime_secs));
        }

        bed.engine().sync(strategy).unwrap();
        let second = bed.engine().sync(strategy).unwrap();

        for pass in [second.pull, second.push].into_iter().flatten() {
            prop_assert!(pass.is_noop(), "{} {}: {:?}", strategy, pass.direction, pass.items);
            prop_assert_eq!(pass.failed, 0);
        }
    }

    #[test]
    fn server_always_wins_mirrors_the_remote(
        local in library_strategy(),
        remote in library_strategy(),
    ) {
        let bed = TestBed::new();
        for (name, file) in &local {
            bed.write_local(name, &file.bytes, file.mtime_secs);
        }
        for (name, file) in &remote {
            bed.remote().insert(name, &file.bytes, Timestamp::from_secs(file.mtime_secs));
        }

        bed.engine().sync(photosync_protocol::Strategy::ServerAlwaysWins).unwrap();

        let expected: Vec<String> = remote.keys().cloned().collect();
        prop_assert_eq!(bed.local_names(), expected);
        for (name, file) in &remote {
            // Equal size and mtime are left alone even when bytes differ.
            let kept_local = local
                .get(name)
                .is_some_and(|l| l.bytes.len() == file.bytes.len() && l.mtime_secs == file.mtime_secs);
            if !kept_local {
                prop_assert_eq!(bed.local_bytes(name).unwrap(), file.bytes.clone());
            }
        }
    }
}
