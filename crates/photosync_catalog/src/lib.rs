//! # PhotoSync Catalog
//!
//! Durable record store for PhotoSync.
//!
//! The catalog keeps two things:
//! - the last known item records of each replica, replaced after every pass
//! - an append-only log of [`SyncLogEntry`] records, one per directional pass
//!
//! ## On-disk layout
//!
//! ```text
//! <catalog_dir>/
//! ├─ LOCK        # Advisory lock, one writer process at a time
//! ├─ ITEMS       # CBOR item records, replaced atomically
//! └─ sync.log    # Framed, checksummed CBOR log entries
//! ```
//!
//! Log entries are never rewritten. A torn record at the tail of `sync.log`
//! (crash during append) is dropped on open; a damaged record followed by
//! valid data is reported as corruption.
//!
//! [`SyncLogEntry`]: photosync_protocol::SyncLogEntry

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod frame;
mod store;

pub use backend::{FileLogBackend, LogBackend, MemoryLogBackend};
pub use error::{CatalogError, CatalogResult};
pub use frame::{scan_frames, FrameScan, FRAME_MAGIC, FRAME_VERSION};
pub use store::{CatalogStatus, CatalogStore, VerifyReport};
