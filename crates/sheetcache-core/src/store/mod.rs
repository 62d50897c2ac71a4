//! Versioned, named response stores.
//!
//! Each store maps a `CacheKey` to a complete `Response` snapshot and is
//! named after the purpose and deploy version it belongs to. Individual
//! operations are atomic; concurrent writers to the same key are
//! last-writer-wins, which is fine for idempotent GETs.
//!
//! Two backends:
//! - `MemoryStorage`: process-local, used in tests and dry runs
//! - `DiskStorage`: one directory per store under the cache root

pub mod disk;
pub mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::http::{CacheKey, Response};
use crate::version::StoreName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", (minutes + 30) / 60)
        } else {
            format!("{}d ago", (minutes + 720) / 1440)
        }
    }
}

pub trait CacheStorage: Send + Sync {
    /// Create the store if it does not exist. Returns true if it was created.
    fn open(&self, name: &StoreName) -> Result<bool, StoreError>;

    fn contains_store(&self, name: &StoreName) -> Result<bool, StoreError>;

    /// Raw names of every store, including ones that do not parse as a `StoreName`.
    fn store_names(&self) -> Result<Vec<String>, StoreError>;

    /// Returns false if there was nothing to delete.
    fn delete_store(&self, name: &str) -> Result<bool, StoreError>;

    fn get(&self, name: &StoreName, key: &CacheKey) -> Result<Option<CachedEntry>, StoreError>;

    /// Insert or replace; opens the store if needed.
    fn put(&self, name: &StoreName, key: &CacheKey, response: &Response) -> Result<(), StoreError>;

    fn keys(&self, name: &StoreName) -> Result<Vec<CacheKey>, StoreError>;
}
