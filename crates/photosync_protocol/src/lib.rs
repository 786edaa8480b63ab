//! # PhotoSync Protocol
//!
//! Data model and decision logic for PhotoSync.
//!
//! This crate provides:
//! - `Item` and `ReplicaSnapshot` for the two replicas
//! - `match_snapshots` for pairing items by logical name
//! - `Resolver` for conflict decisions under a `Strategy`
//! - `SyncLogEntry` for the append-only audit trail
//!
//! This is a pure crate with no I/O operations. Every function here is a
//! deterministic function of its inputs.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod item;
mod log;
mod matcher;
mod resolver;
mod strategy;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use item::{Item, Replica, ReplicaSnapshot};
pub use log::{
    ActionList, Direction, FailedItem, ItemLists, PassCounts, PassStatus, SkipReason, SkippedItem,
    SyncAction, SyncLogEntry,
};
pub use matcher::{match_snapshots, MatchResult};
pub use resolver::{ResolutionDecision, Resolver, UpdateAction, Winner, DEFAULT_GRANULARITY_MS};
pub use strategy::{OnlyLocalAction, OnlyRemoteAction, Strategy};
pub use types::{PassId, Timestamp};
