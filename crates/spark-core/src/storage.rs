//! Persistent storage using redb.
//!
//! Spark persists two kinds of blobs, both addressed by string key:
//! - the full profile collection (`"UserProfiles"`)
//! - per-user interest caches (`"InterestsData_<username>"`)
//!
//! [`KeyValueStore`] is the substrate the profile store depends on.
//! [`Storage`] implements it on disk; [`MemoryStore`] keeps everything in
//! process for tests and ephemeral sessions.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::SparkError;

/// Single key/value table holding every persisted blob
const KV_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Key of the serialized profile collection
pub const PROFILES_KEY: &str = "UserProfiles";

/// Key of a user's cached interests
pub fn interests_key(username: &str) -> String {
    format!("InterestsData_{username}")
}

/// Byte-oriented persistence substrate
pub trait KeyValueStore: Send + Sync {
    /// Load the bytes stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, SparkError>;

    /// Store `bytes` under `key`, replacing any previous value
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), SparkError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), SparkError>;
}

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create the key/value table
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SparkError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KV_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }
}

impl KeyValueStore for Storage {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, SparkError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(KV_TABLE)?;

        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), SparkError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV_TABLE)?;
            table.insert(key, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SparkError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV_TABLE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// In-process key/value store
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, SparkError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), SparkError> {
        self.entries.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SparkError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let storage = Storage::new(&db_path).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_storage_creation() {
        let (_storage, temp_dir) = create_test_storage();
        assert!(temp_dir.path().join("test.redb").exists());
    }

    #[test]
    fn test_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("dir").join("spark.redb");
        Storage::new(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_load_missing_key() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.load(PROFILES_KEY).unwrap().is_none());
    }

    #[test]
    fn test_save_load_and_overwrite() {
        let (storage, _temp) = create_test_storage();

        storage.save(PROFILES_KEY, b"first").unwrap();
        assert_eq!(storage.load(PROFILES_KEY).unwrap().unwrap(), b"first");

        storage.save(PROFILES_KEY, b"second").unwrap();
        assert_eq!(storage.load(PROFILES_KEY).unwrap().unwrap(), b"second");
    }

    #[test]
    fn test_remove() {
        let (storage, _temp) = create_test_storage();
        let key = interests_key("alice");

        storage.save(&key, b"{}").unwrap();
        storage.remove(&key).unwrap();
        assert!(storage.load(&key).unwrap().is_none());

        // Removing again is fine
        storage.remove(&key).unwrap();
    }

    #[test]
    fn test_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");

        {
            let storage = Storage::new(&db_path).unwrap();
            storage.save("k", b"v").unwrap();
        }

        {
            let storage = Storage::new(&db_path).unwrap();
            assert_eq!(storage.load("k").unwrap().unwrap(), b"v");
        }
    }

    #[test]
    fn test_interests_key_format() {
        assert_eq!(interests_key("bob"), "InterestsData_bob");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.save("a", b"1").unwrap();
        let clone = store.clone();
        assert_eq!(clone.load("a").unwrap().unwrap(), b"1");
        assert_eq!(store.len(), 1);

        clone.remove("a").unwrap();
        assert!(store.load("a").unwrap().is_none());
    }
}
