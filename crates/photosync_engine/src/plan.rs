//! Turns match results into per-item actions for one directional pass.

use photosync_protocol::{
    Direction, Item, MatchResult, OnlyLocalAction, OnlyRemoteAction, Replica, Resolver,
    SkipReason, SkippedItem, SyncAction,
};

/// The work for one item, carrying the records it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Download { remote: Item },
    OverwriteLocal { remote: Item },
    DeleteLocal { local: Item },
    Upload { local: Item },
    ReplaceRemote { local: Item, remote: Item },
    DeleteRemote { remote: Item },
}

impl Step {
    pub fn action(&self) -> SyncAction {
        match self {
            Step::Download { .. } => SyncAction::Download,
            Step::OverwriteLocal { .. } => SyncAction::OverwriteLocal,
            Step::DeleteLocal { .. } => SyncAction::DeleteLocal,
            Step::Upload { .. } => SyncAction::Upload,
            Step::ReplaceRemote { .. } => SyncAction::ReplaceRemote,
            Step::DeleteRemote { .. } => SyncAction::DeleteRemote,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Step::Download { remote }
            | Step::OverwriteLocal { remote }
            | Step::DeleteRemote { remote } => &remote.logical_name,
            Step::DeleteLocal { local }
            | Step::Upload { local }
            | Step::ReplaceRemote { local, .. } => &local.logical_name,
        }
    }
}

/// Everything a pass will do, decided before any mutation.
#[derive(Debug, Default)]
pub(crate) struct PassPlan {
    pub steps: Vec<Step>,
    pub skipped: Vec<SkippedItem>,
    pub conflicts: u32,
}

impl PassPlan {
    fn skip(&mut self, name: &str, reason: SkipReason) {
        self.skipped.push(SkippedItem {
            name: name.to_string(),
            reason,
        });
    }

    /// Plans a write into the local folder, refusing unusable names.
    fn write_locally(&mut self, remote: &Item, overwrite: bool) {
        if let Err(e) = remote.checked_file_name() {
            tracing::warn!(name = %remote.logical_name, error = %e, "not writing remote item locally");
            self.skip(&remote.logical_name, SkipReason::InvalidName);
            return;
        }
        let remote = remote.clone();
        self.steps.push(if overwrite {
            Step::OverwriteLocal { remote }
        } else {
            Step::Download { remote }
        });
    }
}

/// Plans one pass.
///
/// `matches` must come from the two snapshots of this pass. Only actions
/// belonging to `direction` are planned; the other direction's work is left
/// for its own pass.
pub(crate) fn plan_pass(
    direction: Direction,
    resolver: &Resolver,
    matches: &[MatchResult],
) -> PassPlan {
    let strategy = resolver.strategy();
    let mut plan = PassPlan::default();

    for m in matches {
        match (direction, m) {
            (Direction::Pull, MatchResult::OnlyRemote(remote)) => {
                if strategy.only_remote_action() == OnlyRemoteAction::Download {
                    if remote.corrupted {
                        plan.skip(&remote.logical_name, SkipReason::Corrupted);
                    } else {
                        plan.write_locally(remote, false);
                    }
                }
            }
            (Direction::Pull, MatchResult::OnlyLocal(local)) => {
                if strategy.only_local_action() == OnlyLocalAction::DeleteLocal {
                    plan.steps.push(Step::DeleteLocal {
                        local: local.clone(),
                    });
                }
            }
            (Direction::Push, MatchResult::OnlyLocal(local)) => {
                if strategy.only_local_action() == OnlyLocalAction::Upload {
                    if local.corrupted {
                        plan.skip(&local.logical_name, SkipReason::Corrupted);
                    } else {
                        plan.steps.push(Step::Upload {
                            local: local.clone(),
                        });
                    }
                }
            }
            (Direction::Push, MatchResult::OnlyRemote(remote)) => {
                if strategy.only_remote_action() == OnlyRemoteAction::DeleteRemote {
                    plan.steps.push(Step::DeleteRemote {
                        remote: remote.clone(),
                    });
                }
            }
            (_, MatchResult::Both { local, remote }) => {
                let decision = resolver.resolve(local, remote);
                if let Some(reason) = decision.skipped {
                    plan.skip(&local.logical_name, reason);
                    continue;
                }
                if decision.conflict {
                    plan.conflicts += 1;
                }
                if decision.fallback {
                    tracing::debug!(name = %local.logical_name, "local mtime unknown, taking remote");
                }

                match direction {
                    Direction::Pull if decision.updates_from(Replica::Remote) => {
                        plan.write_locally(remote, true);
                    }
                    Direction::Push if decision.updates_from(Replica::Local) => {
                        plan.steps.push(Step::ReplaceRemote {
                            local: local.clone(),
                            remote: remote.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
    }

    plan
}
