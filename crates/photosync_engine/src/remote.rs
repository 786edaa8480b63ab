//! Remote catalog adapter.

use crate::error::{RemoteError, RemoteResult};
use parking_lot::RwLock;
use photosync_protocol::{Item, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

/// One page of a remote listing. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: u32,
    /// Maximum items per page.
    pub limit: u32,
}

impl PageRequest {
    /// Creates a request for the first page.
    pub fn first(limit: u32) -> Self {
        Self { page: 1, limit }
    }

    /// Returns the request for the following page.
    pub fn next(self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self
        }
    }
}

/// Paging metadata of a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Page number of this response.
    pub page: u32,
    /// Page size used.
    pub limit: u32,
    /// Total number of items in the catalog.
    pub total: u64,
    /// True if more pages follow.
    pub has_more: bool,
}

/// A page of remote items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Items on this page.
    pub items: Vec<Item>,
    /// Paging metadata.
    pub pagination: Pagination,
}

/// The server-side image catalog.
pub trait RemoteCatalog: Send + Sync {
    /// Lists one page of items.
    fn list_items(&self, request: PageRequest) -> RemoteResult<Page>;

    /// Downloads the bytes of an item.
    fn fetch_bytes(&self, id: &str) -> RemoteResult<Vec<u8>>;

    /// Uploads a new item. `modified_at` is a hint the server may ignore.
    fn create_item(
        &self,
        bytes: &[u8],
        display_name: &str,
        modified_at: Option<Timestamp>,
    ) -> RemoteResult<Item>;

    /// Deletes an item.
    fn delete_item(&self, id: &str) -> RemoteResult<()>;
}

#[derive(Debug, Clone)]
struct StoredImage {
    item: Item,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct Faults {
    listing_failures: u32,
    fetch: HashMap<String, RemoteError>,
    create: HashMap<String, RemoteError>,
    delete: HashMap<String, RemoteError>,
}

/// In-process [`RemoteCatalog`] with fault injection.
///
/// Faults are keyed by display name, so tests can fail one item of a pass
/// without knowing its id.
#[derive(Debug)]
pub struct MemoryRemoteCatalog {
    images: RwLock<BTreeMap<u64, StoredImage>>,
    faults: RwLock<Faults>,
    next_id: AtomicU32,
    honour_mtime_hint: bool,
    list_calls: AtomicU32,
    create_calls: AtomicU32,
    delete_calls: AtomicU32,
}

impl Default for MemoryRemoteCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteCatalog {
    /// Creates an empty catalog that keeps uploaded mtime hints.
    pub fn new() -> Self {
        Self {
            images: RwLock::new(BTreeMap::new()),
            faults: RwLock::new(Faults::default()),
            next_id: AtomicU32::new(1),
            honour_mtime_hint: true,
            list_calls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            delete_calls: AtomicU32::new(0),
        }
    }

    /// Makes the catalog stamp uploads with the current time instead of the
    /// client's hint.
    pub fn ignoring_mtime_hint(mut self) -> Self {
        self.honour_mtime_hint = false;
        self
    }

    /// Adds an item directly, bypassing upload bookkeeping.
    pub fn insert(&self, name: &str, bytes: &[u8], modified_at: Timestamp) -> Item {
        self.store(name, bytes, modified_at, false)
    }

    /// Adds an item flagged as corrupted.
    pub fn insert_corrupted(&self, name: &str, bytes: &[u8], modified_at: Timestamp) -> Item {
        self.store(name, bytes, modified_at, true)
    }

    /// Returns the bytes stored under a display name.
    pub fn bytes_of(&self, name: &str) -> Option<Vec<u8>> {
        self.images
            .read()
            .values()
            .find(|s| s.item.logical_name == name)
            .map(|s| s.bytes.clone())
    }

    /// Returns the record stored under a display name.
    pub fn item(&self, name: &str) -> Option<Item> {
        self.images
            .read()
            .values()
            .find(|s| s.item.logical_name == name)
            .map(|s| s.item.clone())
    }

    /// Returns all display names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .images
            .read()
            .values()
            .map(|s| s.item.logical_name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }

    /// Makes the next `times` listing calls fail with a retryable error.
    pub fn fail_listing(&self, times: u32) {
        self.faults.write().listing_failures = times;
    }

    /// Makes downloads of `name` fail.
    pub fn fail_fetch(&self, name: &str, error: RemoteError) {
        self.faults.write().fetch.insert(name.to_string(), error);
    }

    /// Makes uploads of `name` fail.
    pub fn fail_create(&self, name: &str, error: RemoteError) {
        self.faults.write().create.insert(name.to_string(), error);
    }

    /// Makes deletion of `name` fail.
    pub fn fail_delete(&self, name: &str, error: RemoteError) {
        self.faults.write().delete.insert(name.to_string(), error);
    }

    /// Clears all injected faults.
    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }

    /// Number of `list_items` calls so far.
    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `create_item` calls so far.
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_item` calls so far.
    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn store(&self, name: &str, bytes: &[u8], modified_at: Timestamp, corrupted: bool) -> Item {
        let id = u64::from(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut images = self.images.write();

        // Storage names stay unique; display names do not have to.
        let mut storage_name = name.to_string();
        let mut suffix = 1;
        while images.values().any(|s| s.item.storage_name == storage_name) {
            storage_name = match name.rsplit_once('.') {
                Some((stem, ext)) => format!("{stem}-{suffix}.{ext}"),
                None => format!("{name}-{suffix}"),
            };
            suffix += 1;
        }

        let item = Item::remote(
            id.to_string(),
            name,
            storage_name,
            bytes.len() as u64,
            modified_at,
        )
        .with_corrupted(corrupted);
        images.insert(
            id,
            StoredImage {
                item: item.clone(),
                bytes: bytes.to_vec(),
            },
        );
        item
    }

    fn lookup(&self, id: &str) -> RemoteResult<(u64, StoredImage)> {
        let key: u64 = id
            .parse()
            .map_err(|_| RemoteError::status(404, format!("no image with id {id}")))?;
        self.images
            .read()
            .get(&key)
            .cloned()
            .map(|s| (key, s))
            .ok_or_else(|| RemoteError::status(404, format!("no image with id {id}")))
    }
}

impl RemoteCatalog for MemoryRemoteCatalog {
    fn list_items(&self, request: PageRequest) -> RemoteResult<Page> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut faults = self.faults.write();
            if faults.listing_failures > 0 {
                faults.listing_failures -= 1;
                return Err(RemoteError::status(503, "catalog temporarily unavailable"));
            }
        }

        let images = self.images.read();
        let limit = request.limit.max(1) as usize;
        let skip = (request.page.max(1) as usize - 1) * limit;
        let items: Vec<Item> = images
            .values()
            .skip(skip)
            .take(limit)
            .map(|s| s.item.clone())
            .collect();
        let total = images.len() as u64;

        Ok(Page {
            pagination: Pagination {
                page: request.page,
                limit: request.limit,
                total,
                has_more: (skip + items.len()) < images.len(),
            },
            items,
        })
    }

    fn fetch_bytes(&self, id: &str) -> RemoteResult<Vec<u8>> {
        let (_, stored) = self.lookup(id)?;
        if let Some(err) = self.faults.read().fetch.get(&stored.item.logical_name) {
            return Err(err.clone());
        }
        Ok(stored.bytes)
    }

    fn create_item(
        &self,
        bytes: &[u8],
        display_name: &str,
        modified_at: Option<Timestamp>,
    ) -> RemoteResult<Item> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.faults.read().create.get(display_name) {
            return Err(err.clone());
        }

        let stamp = match modified_at {
            Some(hint) if self.honour_mtime_hint => hint,
            _ => Timestamp::now(),
        };
        Ok(self.store(display_name, bytes, stamp, false))
    }

    fn delete_item(&self, id: &str) -> RemoteResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let (key, stored) = self.lookup(id)?;
        if let Some(err) = self.faults.read().delete.get(&stored.item.logical_name) {
            return Err(err.clone());
        }
        self.images.write().remove(&key);
        Ok(())
    }
}
