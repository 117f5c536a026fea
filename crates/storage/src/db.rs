//! sled database wrapper with serialization helpers.

use herdledger_core::Hash;
use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid chain state: {0}")]
    InvalidChainState(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Wrapper around sled database with serialization helpers.
pub struct Storage {
    db: Db,
}

impl Storage {
    /// Open a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open an in-memory database (for testing).
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Store a serializable value.
    pub fn put<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: serde::Serialize + ?Sized,
    {
        let encoded = bincode::serialize(value)?;
        self.db.insert(key, encoded)?;
        Ok(())
    }

    /// Retrieve and deserialize a value.
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: serde::de::DeserializeOwned,
    {
        match self.db.get(key)? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Check if a key exists.
    pub fn contains<K: AsRef<[u8]>>(&self, key: K) -> Result<bool> {
        Ok(self.db.contains_key(key)?)
    }

    /// Collect the suffixes of all keys starting with `prefix`, in key order.
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in self.db.scan_prefix(prefix) {
            let (key, _) = entry?;
            keys.push(String::from_utf8_lossy(&key[prefix.len()..]).into_owned());
        }
        Ok(keys)
    }

    /// Apply multiple operations atomically.
    ///
    /// Atomicity comes from sled's `apply_batch`: either every operation in
    /// the batch becomes visible or none does.
    pub fn batch(&self, operations: Vec<BatchOp>) -> Result<()> {
        let mut batch = sled::Batch::default();
        for op in operations {
            match op {
                BatchOp::Insert { key, value } => batch.insert(key, value),
                BatchOp::Remove { key } => batch.remove(key),
            }
        }
        self.db.apply_batch(batch)?;
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // =========================================================================
    // Key Construction Helpers
    // =========================================================================

    /// Prefix shared by all asset keys.
    pub const ASSET_PREFIX: &'static [u8] = b"asset:";

    /// Prefix shared by all contract keys.
    pub const CONTRACT_PREFIX: &'static [u8] = b"contract:";

    /// Create a prefixed key for asset records.
    /// Format: "asset:{asset_id}"
    pub fn asset_key(asset_id: &str) -> Vec<u8> {
        let mut key = Self::ASSET_PREFIX.to_vec();
        key.extend_from_slice(asset_id.as_bytes());
        key
    }

    /// Create a prefixed key for breeding contracts.
    /// Format: "contract:{contract_id}"
    pub fn contract_key(contract_id: &str) -> Vec<u8> {
        let mut key = Self::CONTRACT_PREFIX.to_vec();
        key.extend_from_slice(contract_id.as_bytes());
        key
    }

    /// Create a prefixed key for blocks by index.
    /// Format: "block:height:{index}"
    pub fn block_height_key(index: u64) -> Vec<u8> {
        format!("block:height:{}", index).into_bytes()
    }

    /// Create a prefixed key for blocks by hash.
    /// Format: "block:hash:" + hash_bytes
    pub fn block_hash_key(hash: &Hash) -> Vec<u8> {
        let mut key = b"block:hash:".to_vec();
        key.extend_from_slice(&hash.0);
        key
    }
}

/// Batch operation for atomic updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Remove { key: Vec<u8> },
}

impl BatchOp {
    /// Serialize `value` into an insert operation.
    pub fn put<V: serde::Serialize + ?Sized>(key: Vec<u8>, value: &V) -> Result<Self> {
        Ok(BatchOp::Insert {
            key,
            value: bincode::serialize(value)?,
        })
    }
}
