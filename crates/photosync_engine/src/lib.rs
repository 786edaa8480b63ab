//! # PhotoSync Engine
//!
//! Bidirectional sync between a local image folder and a remote image
//! catalog.
//!
//! This crate provides:
//! - The sync orchestrator ([`SyncEngine`]) with pull, push and combined sync
//! - Local folder and remote catalog adapters behind traits
//! - An HTTP remote catalog over an abstract [`HttpClient`]
//! - Retry with exponential backoff for remote listing
//!
//! ## Pass model
//!
//! Every pass follows the same steps:
//! 1. Snapshot the remote catalog (paginated), then the local folder
//! 2. Match the snapshots by display name
//! 3. Resolve matched pairs under the chosen strategy
//! 4. Run per-item actions on a bounded worker pool
//! 5. Append one log entry to the catalog and record the post-pass item view
//!
//! Per-item failures are recorded in the log entry and never abort the pass.
//! Failures before step 4 abort the pass and leave a `Failed` entry.
//!
//! ## Key Invariants
//!
//! - Both snapshots are taken before anything is mutated
//! - One pass at a time per engine
//! - Running the same pass twice without external changes moves nothing
//! - Log entries are append-only and list items in name order

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod executor;
mod http;
mod local;
mod plan;
mod remote;
mod state;

pub use config::{
    RetryConfig, SyncConfig, DEFAULT_PAGE_SIZE, DEFAULT_PARALLEL_TRANSFERS, MAX_PAGE_SIZE,
};
pub use engine::{CancelHandle, PassReport, SyncEngine, SyncReport};
pub use error::{LocalError, LocalResult, RemoteError, RemoteResult, SyncError, SyncResult};
pub use http::{
    HttpClient, HttpMethod, HttpRemoteCatalog, HttpRequest, HttpResponse, ImageListResponse,
    RemoteImage,
};
pub use local::{FileStat, FsLocalDirectory, LocalDirectory};
pub use remote::{MemoryRemoteCatalog, Page, PageRequest, Pagination, RemoteCatalog};
pub use state::{SyncState, SyncStats};
