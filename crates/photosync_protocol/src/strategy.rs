//! Sync strategies and the one-sided propagation table.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policy deciding conflict winners and which replica is the source of truth
/// for additions and removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// The side with the strictly newer modification time wins.
    LastWriteWins,
    /// The remote catalog is the truth.
    ServerAlwaysWins,
    /// The local folder is the truth.
    LocalAlwaysWins,
}

/// What to do with an item present only in the local snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlyLocalAction {
    /// Create it in the remote catalog.
    Upload,
    /// The remote deleted it; remove the local copy.
    DeleteLocal,
}

/// What to do with an item present only in the remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlyRemoteAction {
    /// Fetch it into the local folder.
    Download,
    /// The local side deleted it; remove the remote record.
    DeleteRemote,
}

impl Strategy {
    /// All strategies, in code order.
    pub const ALL: [Strategy; 3] = [
        Strategy::LastWriteWins,
        Strategy::ServerAlwaysWins,
        Strategy::LocalAlwaysWins,
    ];

    /// Action for a local-only item.
    ///
    /// Only `ServerAlwaysWins` deletes locally: a local-only item means the
    /// remote, which is the truth, no longer has it.
    #[must_use]
    pub const fn only_local_action(self) -> OnlyLocalAction {
        match self {
            Strategy::ServerAlwaysWins => OnlyLocalAction::DeleteLocal,
            Strategy::LocalAlwaysWins | Strategy::LastWriteWins => OnlyLocalAction::Upload,
        }
    }

    /// Action for a remote-only item.
    ///
    /// Only `LocalAlwaysWins` deletes remotely.
    #[must_use]
    pub const fn only_remote_action(self) -> OnlyRemoteAction {
        match self {
            Strategy::LocalAlwaysWins => OnlyRemoteAction::DeleteRemote,
            Strategy::ServerAlwaysWins | Strategy::LastWriteWins => OnlyRemoteAction::Download,
        }
    }

    /// Returns true if a combined sync needs the pull half.
    #[must_use]
    pub const fn runs_pull(self) -> bool {
        !matches!(self, Strategy::LocalAlwaysWins)
    }

    /// Returns true if a combined sync needs the push half.
    #[must_use]
    pub const fn runs_push(self) -> bool {
        !matches!(self, Strategy::ServerAlwaysWins)
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Strategy::LastWriteWins => "last-write-wins",
            Strategy::ServerAlwaysWins => "server-always-wins",
            Strategy::LocalAlwaysWins => "local-always-wins",
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::LastWriteWins
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "last-write-wins" | "lww" => Ok(Strategy::LastWriteWins),
            "server-always-wins" | "server-wins" | "server" => Ok(Strategy::ServerAlwaysWins),
            "local-always-wins" | "local-wins" | "local" => Ok(Strategy::LocalAlwaysWins),
            _ => Err(ProtocolError::UnknownStrategy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_sided_table() {
        use OnlyLocalAction::*;
        use OnlyRemoteAction::*;

        assert_eq!(Strategy::ServerAlwaysWins.only_local_action(), DeleteLocal);
        assert_eq!(Strategy::ServerAlwaysWins.only_remote_action(), Download);
        assert_eq!(Strategy::LocalAlwaysWins.only_local_action(), Upload);
        assert_eq!(Strategy::LocalAlwaysWins.only_remote_action(), DeleteRemote);
        assert_eq!(Strategy::LastWriteWins.only_local_action(), Upload);
        assert_eq!(Strategy::LastWriteWins.only_remote_action(), Download);
    }

    #[test]
    fn combined_sync_halves() {
        assert!(Strategy::LastWriteWins.runs_pull());
        assert!(Strategy::LastWriteWins.runs_push());
        assert!(Strategy::ServerAlwaysWins.runs_pull());
        assert!(!Strategy::ServerAlwaysWins.runs_push());
        assert!(!Strategy::LocalAlwaysWins.runs_pull());
        assert!(Strategy::LocalAlwaysWins.runs_push());
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!("lww".parse::<Strategy>().unwrap(), Strategy::LastWriteWins);
        assert_eq!(
            "SERVER_ALWAYS_WINS".parse::<Strategy>().unwrap(),
            Strategy::ServerAlwaysWins
        );
        assert_eq!("local".parse::<Strategy>().unwrap(), Strategy::LocalAlwaysWins);
        assert!(matches!(
            "newest".parse::<Strategy>(),
            Err(ProtocolError::UnknownStrategy(_))
        ));
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
    }
}
