use crate::domain::ports::SessionStore;
use crate::domain::session::SessionId;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Column Family holding session entries.
pub const CF_SESSIONS: &str = "sessions";

/// How long an entry outlives its last write when no timeout is given.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

const STAMP_LEN: usize = 8;

/// A persistent session store backed by RocksDB.
///
/// Entries live in the `sessions` column family under
/// `<session id> NUL <key>`, so one session never reads another's data.
/// Lets in-flight payments survive a restart of the process driving them.
///
/// Each value is prefixed with its write time (big-endian unix millis).
/// An entry older than the idle timeout reads as absent and is deleted;
/// opening the store deletes every such entry.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBSessionStore {
    db: Arc<DB>,
    idle_timeout: Duration,
}

impl RocksDBSessionStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_idle_timeout(path, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn open_with_idle_timeout<P: AsRef<Path>>(path: P, idle_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_sessions = ColumnFamilyDescriptor::new(CF_SESSIONS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_sessions])?;

        let store = Self {
            db: Arc::new(db),
            idle_timeout,
        };
        store.purge_expired()?;
        Ok(store)
    }

    /// Deletes every entry that has outlived the idle timeout.
    pub fn purge_expired(&self) -> Result<usize> {
        let cf = self.sessions_cf()?;
        let now = now_millis();
        let mut batch = WriteBatch::default();
        let mut purged = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            if self.unstamp(&value, now).is_none() {
                batch.delete_cf(cf, key);
                purged += 1;
            }
        }
        if purged > 0 {
            self.db.write(batch)?;
            tracing::debug!(purged, "expired session entries dropped");
        }
        Ok(purged)
    }

    fn entry_key(session: &SessionId, key: &str) -> Vec<u8> {
        let mut entry = Vec::with_capacity(session.as_str().len() + key.len() + 1);
        entry.extend_from_slice(session.as_str().as_bytes());
        entry.push(0);
        entry.extend_from_slice(key.as_bytes());
        entry
    }

    fn stamp(value: &[u8], now: u64) -> Vec<u8> {
        let mut entry = Vec::with_capacity(STAMP_LEN + value.len());
        entry.extend_from_slice(&now.to_be_bytes());
        entry.extend_from_slice(value);
        entry
    }

    /// Payload of an entry still within the idle timeout.
    fn unstamp<'a>(&self, entry: &'a [u8], now: u64) -> Option<&'a [u8]> {
        let (stamp, payload) = entry.split_first_chunk::<STAMP_LEN>()?;
        let age = Duration::from_millis(now.saturating_sub(u64::from_be_bytes(*stamp)));
        (age <= self.idle_timeout).then_some(payload)
    }

    fn sessions_cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CF_SESSIONS)
            .ok_or_else(|| PaymentError::Storage("sessions column family not found".to_string()))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[async_trait]
impl SessionStore for RocksDBSessionStore {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.sessions_cf()?;
        let entry_key = Self::entry_key(session, key);
        let Some(entry) = self.db.get_cf(cf, &entry_key)? else {
            return Ok(None);
        };
        match self.unstamp(&entry, now_millis()) {
            Some(payload) => Ok(Some(payload.to_vec())),
            None => {
                tracing::debug!(%session, "session entry expired");
                self.db.delete_cf(cf, entry_key)?;
                Ok(None)
            }
        }
    }

    async fn set(&self, session: &SessionId, key: &str, value: Vec<u8>) -> Result<()> {
        let cf = self.sessions_cf()?;
        let entry = Self::stamp(&value, now_millis());
        self.db.put_cf(cf, Self::entry_key(session, key), entry)?;
        Ok(())
    }

    async fn remove(&self, session: &SessionId, key: &str) -> Result<()> {
        let cf = self.sessions_cf()?;
        self.db.delete_cf(cf, Self::entry_key(session, key))?;
        Ok(())
    }
}
