use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;
use crate::http::{CacheKey, Response};
use crate::store::{CacheStorage, CachedEntry};
use crate::version::StoreName;

type Stores = BTreeMap<String, HashMap<CacheKey, CachedEntry>>;

#[derive(Default)]
pub struct MemoryStorage {
    stores: RwLock<Stores>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store under an arbitrary raw name (e.g. one left by an older deploy)
    pub fn open_raw(&self, name: &str) {
        self.write().entry(name.to_string()).or_default();
    }

    fn read(&self) -> RwLockReadGuard<'_, Stores> {
        // A panicked writer cannot leave a map half-updated, so poisoning is ignored
        self.stores.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Stores> {
        self.stores.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheStorage for MemoryStorage {
    fn open(&self, name: &StoreName) -> Result<bool, StoreError> {
        let mut stores = self.write();
        let name = name.to_string();
        if stores.contains_key(&name) {
            return Ok(false);
        }
        stores.insert(name, HashMap::new());
        Ok(true)
    }

    fn contains_store(&self, name: &StoreName) -> Result<bool, StoreError> {
        Ok(self.read().contains_key(&name.to_string()))
    }

    fn store_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read().keys().cloned().collect())
    }

    fn delete_store(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.write().remove(name).is_some())
    }

    fn get(&self, name: &StoreName, key: &CacheKey) -> Result<Option<CachedEntry>, StoreError> {
        Ok(self
            .read()
            .get(&name.to_string())
            .and_then(|store| store.get(key))
            .cloned())
    }

    fn put(&self, name: &StoreName, key: &CacheKey, response: &Response) -> Result<(), StoreError> {
        self.write()
            .entry(name.to_string())
            .or_default()
            .insert(key.clone(), CachedEntry::new(response.clone()));
        Ok(())
    }

    fn keys(&self, name: &StoreName) -> Result<Vec<CacheKey>, StoreError> {
        let stores = self.read();
        let store = stores
            .get(&name.to_string())
            .ok_or_else(|| StoreError::MissingStore(name.to_string()))?;
        let mut keys: Vec<CacheKey> = store.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
