use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;
use crate::http::{CacheKey, Response};
use crate::store::{CacheStorage, CachedEntry};
use crate::version::StoreName;

/// Every store lives under this directory of the cache root. Only its
/// children are ever listed or deleted.
const STORES_DIR: &str = "stores";

const META_EXT: &str = "json";
const BODY_EXT: &str = "body";

/// Entry metadata, written next to the raw body file
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    headers: Vec<(String, String)>,
    url: Option<String>,
    cached_at: DateTime<Utc>,
}

/// Stores laid out on disk as
/// `<root>/stores/<store-name>/<sha256(key)>.{json,body}`.
///
/// The metadata file is written last, so an entry is visible only once its
/// body is complete. Both files are written to a unique temp file in the
/// same directory and renamed into place, so concurrent writers of one key
/// never share a temp path.
pub struct DiskStorage {
    root: PathBuf,
    stores: PathBuf,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Result<Self, StoreError> {
        let stores = root.join(STORES_DIR);
        fs::create_dir_all(&stores)?;
        Ok(Self { root, stores })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parent of every store directory
    pub fn stores_dir(&self) -> &Path {
        &self.stores
    }

    fn store_dir(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.stores.join(name))
    }

    fn entry_stem(key: &CacheKey) -> String {
        hex::encode(Sha256::digest(key.as_str().as_bytes()))
    }

    fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl CacheStorage for DiskStorage {
    fn open(&self, name: &StoreName) -> Result<bool, StoreError> {
        let dir = self.store_dir(&name.to_string())?;
        if dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&dir)?;
        debug!(store = %name, "Created store directory");
        Ok(true)
    }

    fn contains_store(&self, name: &StoreName) -> Result<bool, StoreError> {
        Ok(self.store_dir(&name.to_string())?.is_dir())
    }

    fn store_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.stores)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete_store(&self, name: &str) -> Result<bool, StoreError> {
        let dir = self.store_dir(name)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, name: &StoreName, key: &CacheKey) -> Result<Option<CachedEntry>, StoreError> {
        let dir = self.store_dir(&name.to_string())?;
        let stem = Self::entry_stem(key);

        let meta = match fs::read_to_string(dir.join(format!("{}.{}", stem, META_EXT))) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: EntryMeta = serde_json::from_str(&meta)?;
        let body = fs::read(dir.join(format!("{}.{}", stem, BODY_EXT)))?;

        Ok(Some(CachedEntry {
            response: Response {
                status: meta.status,
                headers: meta.headers,
                body,
                url: meta.url,
            },
            cached_at: meta.cached_at,
        }))
    }

    fn put(&self, name: &StoreName, key: &CacheKey, response: &Response) -> Result<(), StoreError> {
        let dir = self.store_dir(&name.to_string())?;
        fs::create_dir_all(&dir)?;
        let stem = Self::entry_stem(key);

        let meta = EntryMeta {
            key: key.as_str().to_string(),
            status: response.status,
            headers: response.headers.clone(),
            url: response.url.clone(),
            cached_at: Utc::now(),
        };

        Self::write_atomic(&dir, &dir.join(format!("{}.{}", stem, BODY_EXT)), &response.body)?;
        Self::write_atomic(
            &dir,
            &dir.join(format!("{}.{}", stem, META_EXT)),
            serde_json::to_string_pretty(&meta)?.as_bytes(),
        )?;
        Ok(())
    }

    fn keys(&self, name: &StoreName) -> Result<Vec<CacheKey>, StoreError> {
        let dir = self.store_dir(&name.to_string())?;
        if !dir.is_dir() {
            return Err(StoreError::MissingStore(name.to_string()));
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            let meta: EntryMeta = serde_json::from_str(&fs::read_to_string(&path)?)?;
            keys.push(CacheKey::from_raw(meta.key));
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{Purpose, Version};

    fn storage() -> (tempfile::TempDir, DiskStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().join("stores")).unwrap();
        (dir, storage)
    }

    fn static_v1() -> StoreName {
        StoreName::new(Purpose::Static, Version::parse("v1-20251002").unwrap())
    }

    #[test]
    fn test_entry_survives_reopen() {
        let (dir, storage) = storage();
        let key = CacheKey::from_raw("https://app.example.test/styles.css");
        let mut response = Response::new(200, "text/css", "body{}");
        response.url = Some(key.to_string());
        storage.put(&static_v1(), &key, &response).unwrap();

        let reopened = DiskStorage::new(dir.path().join("stores")).unwrap();
        let entry = reopened.get(&static_v1(), &key).unwrap().unwrap();
        assert_eq!(entry.response, response);
        assert_eq!(reopened.keys(&static_v1()).unwrap(), vec![key]);
    }

    #[test]
    fn test_missing_entry_is_none() {
        let (_dir, storage) = storage();
        storage.open(&static_v1()).unwrap();
        let key = CacheKey::from_raw("https://app.example.test/missing.png");
        assert!(storage.get(&static_v1(), &key).unwrap().is_none());
    }

    #[test]
    fn test_store_names_and_delete() {
        let (_dir, storage) = storage();
        assert!(storage.open(&static_v1()).unwrap());
        assert!(!storage.open(&static_v1()).unwrap());
        fs::create_dir_all(storage.stores_dir().join("pkgo-cache-v1-10")).unwrap();

        assert_eq!(
            storage.store_names().unwrap(),
            vec!["pkgo-cache-v1-10".to_string(), "static-v1-20251002".to_string()]
        );

        assert!(storage.delete_store("pkgo-cache-v1-10").unwrap());
        assert!(!storage.delete_store("pkgo-cache-v1-10").unwrap());
        assert!(storage.contains_store(&static_v1()).unwrap());
    }

    #[test]
    fn test_store_names_only_list_the_stores_dir() {
        let (_dir, storage) = storage();
        fs::create_dir_all(storage.root().join("other-app")).unwrap();
        storage.open(&static_v1()).unwrap();

        assert_eq!(
            storage.store_names().unwrap(),
            vec!["static-v1-20251002".to_string()]
        );
    }

    #[test]
    fn test_concurrent_writes_to_one_key() {
        let (_dir, storage) = storage();
        let key = CacheKey::from_raw("https://docs.example.test/sheet.csv");
        let store = static_v1();

        let failures: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|worker| {
                    let (storage, key, store) = (&storage, &key, &store);
                    scope.spawn(move || {
                        (0..50)
                            .filter(|i| {
                                let body = format!("{},{}\n", worker, i);
                                storage
                                    .put(store, key, &Response::new(200, "text/csv", body))
                                    .is_err()
                            })
                            .count()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });

        assert_eq!(failures, 0);
        assert_eq!(storage.keys(&store).unwrap(), vec![key.clone()]);
        let entry = storage.get(&store, &key).unwrap().unwrap();
        assert!(entry.response.body.ends_with(b"49\n"));
        let leftovers = fs::read_dir(storage.stores_dir().join(store.to_string()))
            .unwrap()
            .count();
        assert_eq!(leftovers, 2);
    }

    #[test]
    fn test_rejects_escaping_names() {
        let (_dir, storage) = storage();
        assert!(matches!(
            storage.delete_store("../outside"),
            Err(StoreError::InvalidName(_))
        ));
    }
}
