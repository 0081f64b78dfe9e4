use crate::domain::ports::KeyValueStore;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding the client's key-value entries.
pub const CF_ENTRIES: &str = "entries";

/// A persistent key-value store implementation using RocksDB.
///
/// Keys are stored as UTF-8 bytes and values as JSON.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "entries" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_entries = ColumnFamilyDescriptor::new(CF_ENTRIES, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_entries])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn missing_cf() -> ClientError {
        ClientError::InternalError(Box::new(std::io::Error::other(
            "Entries column family not found",
        )))
    }
}

#[async_trait]
impl KeyValueStore for RocksDBStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let cf = self.db.cf_handle(CF_ENTRIES).ok_or_else(Self::missing_cf)?;

        match self.db.get_cf(&cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let cf = self.db.cf_handle(CF_ENTRIES).ok_or_else(Self::missing_cf)?;

        let bytes = serde_json::to_vec(&value)?;
        self.db.put_cf(&cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let cf = self.db.cf_handle(CF_ENTRIES).ok_or_else(Self::missing_cf)?;

        self.db.delete_cf(&cf, key.as_bytes())?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let cf = self.db.cf_handle(CF_ENTRIES).ok_or_else(Self::missing_cf)?;

        let mut keys = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (key, _value) = item?;
            keys.push(key);
        }
        for key in keys {
            self.db.delete_cf(&cf, key)?;
        }
        Ok(())
    }
}
