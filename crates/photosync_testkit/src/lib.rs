//! # PhotoSync Testkit
//!
//! Test utilities for PhotoSync.
//!
//! This crate provides:
//! - [`TestBed`]: a temporary sync folder, an in-memory remote and an on-disk
//!   catalog wired into a [`SyncEngine`](photosync_engine::SyncEngine)
//! - [`LoopbackClient`]: an [`HttpClient`](photosync_engine::HttpClient) that
//!   serves the image API from a [`MemoryRemoteCatalog`](photosync_engine::MemoryRemoteCatalog)
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use photosync_testkit::prelude::*;
//!
//! #[test]
//! fn pull_downloads() {
//!     let bed = TestBed::new();
//!     bed.remote().insert("a.jpg", b"jpeg", Timestamp::from_secs(100));
//!     let report = bed.engine().pull(Strategy::ServerAlwaysWins).unwrap();
//!     assert_eq!(report.transferred, 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod loopback;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::loopback::*;
    pub use photosync_protocol::{Direction, PassStatus, Strategy, SyncAction, Timestamp};
}

pub use fixtures::*;
pub use generators::*;
pub use loopback::*;
