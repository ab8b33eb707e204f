//! Core Store implementation

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// A persistable record, keyed by id within its collection
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Unique identifier within the collection
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds)
    fn updated_at(&self) -> i64;

    /// Collection file name, e.g. "stories"
    fn collection_name() -> &'static str;
}

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate record in {collection}: {id}")]
    Duplicate { collection: &'static str, id: String },

    #[error("Record not found in {collection}: {id}")]
    NotFound { collection: &'static str, id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent store holding one id-keyed collection per record type
#[derive(Debug, Clone)]
pub struct Store {
    base_path: PathBuf,
}

impl Store {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        debug!(?base_path, "Opened store");
        Ok(Self { base_path })
    }

    /// Base directory of the store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Insert a new record; fails if the id is already present
    pub fn insert<R: Record>(&self, record: R) -> StoreResult<String> {
        self.with_collection(|map: &mut BTreeMap<String, R>| {
            let id = record.id().to_string();
            if map.contains_key(&id) {
                return Err(StoreError::Duplicate {
                    collection: R::collection_name(),
                    id,
                });
            }
            map.insert(id.clone(), record);
            Ok(id)
        })
    }

    /// Replace an existing record; fails if the id is absent
    pub fn update<R: Record>(&self, record: R) -> StoreResult<()> {
        self.with_collection(|map: &mut BTreeMap<String, R>| {
            let id = record.id().to_string();
            if !map.contains_key(&id) {
                return Err(StoreError::NotFound {
                    collection: R::collection_name(),
                    id,
                });
            }
            map.insert(id, record);
            Ok(())
        })
    }

    /// Fetch a record by id
    pub fn get<R: Record>(&self, id: &str) -> StoreResult<Option<R>> {
        let map: BTreeMap<String, R> = self.read_collection()?;
        Ok(map.get(id).cloned())
    }

    /// List all records in a collection, ordered by id
    pub fn list<R: Record>(&self) -> StoreResult<Vec<R>> {
        let map: BTreeMap<String, R> = self.read_collection()?;
        Ok(map.into_values().collect())
    }

    /// Delete a record by id; fails if the id is absent
    pub fn delete<R: Record>(&self, id: &str) -> StoreResult<()> {
        self.with_collection(|map: &mut BTreeMap<String, R>| {
            if map.remove(id).is_none() {
                return Err(StoreError::NotFound {
                    collection: R::collection_name(),
                    id: id.to_string(),
                });
            }
            Ok(())
        })
    }

    /// Remove every record in a collection
    pub fn clear<R: Record>(&self) -> StoreResult<usize> {
        self.with_collection(|map: &mut BTreeMap<String, R>| {
            let count = map.len();
            map.clear();
            Ok(count)
        })
    }

    fn collection_path<R: Record>(&self) -> PathBuf {
        self.base_path.join(format!("{}.json", R::collection_name()))
    }

    fn lock_path<R: Record>(&self) -> PathBuf {
        self.base_path.join(format!("{}.lock", R::collection_name()))
    }

    fn read_collection<R: Record>(&self) -> StoreResult<BTreeMap<String, R>> {
        let path = self.collection_path::<R>();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn write_collection<R: Record>(&self, map: &BTreeMap<String, R>) -> StoreResult<()> {
        let path = self.collection_path::<R>();
        // Write to a sibling temp file first so readers never see a torn file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Run a read-modify-write on a collection under an exclusive file lock
    fn with_collection<R, T, F>(&self, f: F) -> StoreResult<T>
    where
        R: Record,
        F: FnOnce(&mut BTreeMap<String, R>) -> StoreResult<T>,
    {
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path::<R>())?;
        lock_file.lock_exclusive()?;

        let result = (|| {
            let mut map = self.read_collection::<R>()?;
            let out = f(&mut map)?;
            self.write_collection(&map)?;
            Ok(out)
        })();

        let _ = FileExt::unlock(&lock_file);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: String,
        label: String,
        updated_at: i64,
    }

    impl Record for Widget {
        fn id(&self) -> &str {
            &self.id
        }

        fn updated_at(&self) -> i64 {
            self.updated_at
        }

        fn collection_name() -> &'static str {
            "widgets"
        }
    }

    fn widget(id: &str, label: &str) -> Widget {
        Widget {
            id: id.to_string(),
            label: label.to_string(),
            updated_at: crate::now_ms(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.insert(widget("w-1", "first")).unwrap();

        let found: Widget = store.get("w-1").unwrap().unwrap();
        assert_eq!(found.label, "first");

        let missing: Option<Widget> = store.get("w-2").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.insert(widget("w-1", "first")).unwrap();
        let result = store.insert(widget("w-1", "again"));
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));

        // The original record is untouched
        let found: Widget = store.get("w-1").unwrap().unwrap();
        assert_eq!(found.label, "first");
    }

    #[test]
    fn test_update_existing() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.insert(widget("w-1", "first")).unwrap();
        store.update(widget("w-1", "renamed")).unwrap();

        let found: Widget = store.get("w-1").unwrap().unwrap();
        assert_eq!(found.label, "renamed");
    }

    #[test]
    fn test_update_missing_fails() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let result = store.update(widget("w-404", "ghost"));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_list_ordered_by_id() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.insert(widget("w-2", "b")).unwrap();
        store.insert(widget("w-1", "a")).unwrap();
        store.insert(widget("w-3", "c")).unwrap();

        let all: Vec<Widget> = store.list().unwrap();
        let ids: Vec<&str> = all.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["w-1", "w-2", "w-3"]);
    }

    #[test]
    fn test_delete() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.insert(widget("w-1", "first")).unwrap();
        store.delete::<Widget>("w-1").unwrap();

        let missing: Option<Widget> = store.get("w-1").unwrap();
        assert!(missing.is_none());

        let result = store.delete::<Widget>("w-1");
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = Store::open(temp.path()).unwrap();
            store.insert(widget("w-1", "durable")).unwrap();
        }

        let reopened = Store::open(temp.path()).unwrap();
        let found: Widget = reopened.get("w-1").unwrap().unwrap();
        assert_eq!(found.label, "durable");
    }

    #[test]
    fn test_clear() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        store.insert(widget("w-1", "a")).unwrap();
        store.insert(widget("w-2", "b")).unwrap();

        assert_eq!(store.clear::<Widget>().unwrap(), 2);
        let all: Vec<Widget> = store.list().unwrap();
        assert!(all.is_empty());
    }
}
