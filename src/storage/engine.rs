use rocksdb::{Options, DB};
use std::path::Path;
use std::sync::Arc;

use super::DurableStore;
use crate::error::{SyncError, SyncResult};

/// Durable store backed by RocksDB
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
    path: std::path::PathBuf,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.path)
            .finish()
    }
}

impl RocksStore {
    /// Open (or create) the store in `data_dir`
    pub fn open<P: AsRef<Path>>(data_dir: P) -> SyncResult<Self> {
        let path = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);

        // Collections are small and rewritten whole; keep WAL and LOG files bounded
        opts.set_max_total_wal_size(16 * 1024 * 1024);
        opts.set_keep_log_file_num(3);
        opts.set_recycle_log_file_num(2);

        let db = DB::open(&opts, &path)
            .map_err(|e| SyncError::StorageError(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> SyncResult<()> {
        self.db
            .flush()
            .map_err(|e| SyncError::StorageError(format!("Failed to flush: {}", e)))
    }
}

impl DurableStore for RocksStore {
    fn get(&self, key: &str) -> SyncResult<Option<Vec<u8>>> {
        Ok(self.db.get(key.as_bytes())?)
    }

    fn set(&self, key: &str, value: &[u8]) -> SyncResult<()> {
        Ok(self.db.put(key.as_bytes(), value)?)
    }

    fn delete(&self, key: &str) -> SyncResult<()> {
        Ok(self.db.delete(key.as_bytes())?)
    }
}
