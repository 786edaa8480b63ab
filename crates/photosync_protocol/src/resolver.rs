//! Conflict resolution for items present on both replicas.

use crate::item::{Item, Replica};
use crate::log::SkipReason;
use crate::strategy::Strategy;

/// Default timestamp comparison granularity, in milliseconds.
///
/// Filesystems differ in mtime precision; comparing at whole seconds keeps a
/// freshly propagated timestamp equal to its source on every platform.
pub const DEFAULT_GRANULARITY_MS: u64 = 1000;

/// The side whose content should win.
pub type Winner = Replica;

/// Whether content has to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// The sides are equivalent under the strategy; nothing moves.
    None,
    /// The winner's content replaces the loser's.
    Update,
}

/// Outcome of resolving a `Both` match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionDecision {
    /// Winning side. `None` on a last-write-wins tie or a skipped pair.
    pub winner: Option<Winner>,
    /// Whether content has to move from the winner to the loser.
    pub action: UpdateAction,
    /// True if the two sides really differ, whichever side wins.
    pub conflict: bool,
    /// True if the decision came from the missing-local-mtime fallback.
    pub fallback: bool,
    /// Set when the pair is excluded from content diffing.
    pub skipped: Option<SkipReason>,
}

impl ResolutionDecision {
    fn new(winner: Option<Winner>, action: UpdateAction, conflict: bool) -> Self {
        Self {
            winner,
            action,
            conflict,
            fallback: false,
            skipped: None,
        }
    }

    fn skip(reason: SkipReason) -> Self {
        Self {
            winner: None,
            action: UpdateAction::None,
            conflict: false,
            fallback: false,
            skipped: Some(reason),
        }
    }

    /// Returns true if `side` wins and content has to move.
    #[must_use]
    pub fn updates_from(&self, side: Replica) -> bool {
        self.action == UpdateAction::Update && self.winner == Some(side)
    }
}

/// Resolves `Both` matches under a fixed strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolver {
    strategy: Strategy,
    granularity_ms: u64,
}

impl Resolver {
    /// Creates a resolver with the default one-second granularity.
    #[must_use]
    pub const fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            granularity_ms: DEFAULT_GRANULARITY_MS,
        }
    }

    /// Sets the timestamp comparison granularity in milliseconds.
    #[must_use]
    pub const fn with_granularity_ms(mut self, granularity_ms: u64) -> Self {
        self.granularity_ms = granularity_ms;
        self
    }

    /// Returns the strategy.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Resolves one matched pair.
    ///
    /// | Strategy | Rule |
    /// |---|---|
    /// | `ServerAlwaysWins` | remote wins; update unless size and mtime match |
    /// | `LocalAlwaysWins` | local wins; same equivalence check |
    /// | `LastWriteWins` | strictly newer side wins; equal mtimes do nothing |
    ///
    /// Under `LastWriteWins`, a local item without a timestamp (stat failed)
    /// falls back to taking the remote version. The decision is flagged with
    /// `fallback = true`.
    ///
    /// Corrupted items on either side are skipped.
    #[must_use]
    pub fn resolve(&self, local: &Item, remote: &Item) -> ResolutionDecision {
        if local.corrupted || remote.corrupted {
            return ResolutionDecision::skip(SkipReason::Corrupted);
        }

        let equivalent = local.is_equivalent(remote, self.granularity_ms);

        match self.strategy {
            Strategy::ServerAlwaysWins => self.always(Replica::Remote, equivalent),
            Strategy::LocalAlwaysWins => self.always(Replica::Local, equivalent),
            Strategy::LastWriteWins => self.last_write_wins(local, remote, equivalent),
        }
    }

    fn always(&self, winner: Replica, equivalent: bool) -> ResolutionDecision {
        let action = if equivalent {
            UpdateAction::None
        } else {
            UpdateAction::Update
        };
        ResolutionDecision::new(Some(winner), action, !equivalent)
    }

    fn last_write_wins(&self, local: &Item, remote: &Item, equivalent: bool) -> ResolutionDecision {
        let local_ts = local.modified_at.map(|t| t.truncate(self.granularity_ms));
        let remote_ts = remote.modified_at.map(|t| t.truncate(self.granularity_ms));

        match (local_ts, remote_ts) {
            (None, _) => ResolutionDecision {
                fallback: true,
                ..ResolutionDecision::new(Some(Replica::Remote), UpdateAction::Update, true)
            },
            // Remote records always carry a timestamp; treat a missing one as
            // the oldest possible so the local copy is kept.
            (Some(_), None) => {
                ResolutionDecision::new(Some(Replica::Local), UpdateAction::Update, true)
            }
            (Some(l), Some(r)) if l > r => {
                ResolutionDecision::new(Some(Replica::Local), UpdateAction::Update, true)
            }
            (Some(l), Some(r)) if r > l => {
                ResolutionDecision::new(Some(Replica::Remote), UpdateAction::Update, true)
            }
            (Some(_), Some(_)) => ResolutionDecision::new(None, UpdateAction::None, !equivalent),
        }
    }
}
