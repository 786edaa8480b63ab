//! Runs the planned item actions of a pass on a bounded worker pool.

use crate::error::{LocalError, RemoteError, SyncError, SyncResult};
use crate::local::LocalDirectory;
use crate::plan::Step;
use crate::remote::RemoteCatalog;
use parking_lot::Mutex;
use photosync_protocol::{Item, ProtocolError, Replica, SkipReason, SyncAction};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, warn};

/// What a successful action changed on the receiving replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    Put(Replica, Item),
    Remove(Replica),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Done(Effect),
    /// `applied` is set when the action failed part way and already changed
    /// the receiving replica.
    Failed {
        error: String,
        applied: Option<Effect>,
    },
    Skipped(SkipReason),
}

/// A failed action and whatever it changed before failing.
struct StepFailure {
    error: SyncError,
    applied: Option<Effect>,
}

impl From<SyncError> for StepFailure {
    fn from(error: SyncError) -> Self {
        Self {
            error,
            applied: None,
        }
    }
}

impl From<LocalError> for StepFailure {
    fn from(error: LocalError) -> Self {
        SyncError::from(error).into()
    }
}

impl From<RemoteError> for StepFailure {
    fn from(error: RemoteError) -> Self {
        SyncError::from(error).into()
    }
}

impl From<ProtocolError> for StepFailure {
    fn from(error: ProtocolError) -> Self {
        SyncError::from(error).into()
    }
}

/// Result of one item, folded into the pass tally after all workers finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemOutcome {
    pub name: String,
    pub action: SyncAction,
    pub outcome: Outcome,
}

pub(crate) struct Executor<'a, L, R> {
    pub local: &'a L,
    pub remote: &'a R,
    pub folder: &'a Path,
    pub cancelled: &'a AtomicBool,
    pub workers: usize,
}

impl<L: LocalDirectory, R: RemoteCatalog> Executor<'_, L, R> {
    /// Runs every step. Outcomes come back in no particular order.
    pub fn run(&self, steps: Vec<Step>) -> Vec<ItemOutcome> {
        let workers = self.workers.clamp(1, steps.len().max(1));
        if workers == 1 {
            return steps.into_iter().map(|s| self.run_step(s)).collect();
        }

        let queue = Mutex::new(steps.into_iter());
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let next = queue.lock().next();
                            let Some(step) = next else { break };
                            done.push(self.run_step(step));
                        }
                        done
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    }

    fn run_step(&self, step: Step) -> ItemOutcome {
        let name = step.name().to_string();
        let action = step.action();

        if self.cancelled.load(Ordering::SeqCst) {
            return ItemOutcome {
                name,
                action,
                outcome: Outcome::Skipped(SkipReason::Cancelled),
            };
        }

        let outcome = match self.apply(&step) {
            Ok(effect) => {
                debug!(%name, %action, "item done");
                Outcome::Done(effect)
            }
            Err(failure) => {
                let error = match &failure.applied {
                    Some(Effect::Remove(replica)) => {
                        format!("{replica} copy was removed: {}", failure.error)
                    }
                    _ => failure.error.to_string(),
                };
                warn!(%name, %action, %error, partial = failure.applied.is_some(), "item failed");
                Outcome::Failed {
                    error,
                    applied: failure.applied,
                }
            }
        };
        ItemOutcome {
            name,
            action,
            outcome,
        }
    }

    fn apply(&self, step: &Step) -> Result<Effect, StepFailure> {
        match step {
            Step::Download { remote } | Step::OverwriteLocal { remote } => {
                let item = self.download(remote)?;
                Ok(Effect::Put(Replica::Local, item))
            }
            Step::DeleteLocal { local } => {
                self.local
                    .delete_file(&self.folder.join(&local.storage_name))?;
                Ok(Effect::Remove(Replica::Local))
            }
            Step::Upload { local } => {
                let bytes = self.read_local(local)?;
                let item = self.upload(local, &bytes)?;
                Ok(Effect::Put(Replica::Remote, item))
            }
            Step::ReplaceRemote { local, remote } => {
                // Read first so an unreadable file never costs the remote copy.
                let bytes = self.read_local(local)?;
                self.remote.delete_item(remote_id(remote)?)?;
                let item = self.upload(local, &bytes).map_err(|error| StepFailure {
                    error,
                    applied: Some(Effect::Remove(Replica::Remote)),
                })?;
                Ok(Effect::Put(Replica::Remote, item))
            }
            Step::DeleteRemote { remote } => {
                self.remote.delete_item(remote_id(remote)?)?;
                Ok(Effect::Remove(Replica::Remote))
            }
        }
    }

    /// Fetches bytes, writes them under the display name and copies the
    /// remote mtime onto the file.
    fn download(&self, remote: &Item) -> Result<Item, StepFailure> {
        let name = remote.checked_file_name()?;
        let bytes = self.remote.fetch_bytes(remote_id(remote)?)?;
        let path = self.folder.join(name);

        self.local.write_file(&path, &bytes)?;
        let size = bytes.len() as u64;
        if let Some(modified_at) = remote.modified_at {
            // The new content is already in place, with an unknown mtime.
            self.local
                .set_modified_time(&path, modified_at)
                .map_err(|e| StepFailure {
                    error: e.into(),
                    applied: Some(Effect::Put(Replica::Local, Item::local(name, size, None))),
                })?;
        }
        Ok(Item::local(name, size, remote.modified_at))
    }

    fn read_local(&self, local: &Item) -> SyncResult<Vec<u8>> {
        Ok(self
            .local
            .read_file(&self.folder.join(&local.storage_name))?)
    }

    fn upload(&self, local: &Item, bytes: &[u8]) -> SyncResult<Item> {
        let item = self
            .remote
            .create_item(bytes, &local.logical_name, local.modified_at)?;
        Ok(item)
    }
}

fn remote_id(item: &Item) -> SyncResult<&str> {
    item.remote_id.as_deref().ok_or_else(|| {
        SyncError::Remote(RemoteError::invalid_response(format!(
            "remote item {} has no id",
            item.logical_name
        )))
    })
}
