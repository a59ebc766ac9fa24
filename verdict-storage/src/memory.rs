//! In-memory snapshot store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use verdict_core::{Error, Result};

use crate::snapshot::ChainSnapshot;
use crate::traits::SnapshotStore;

/// Keeps the encoded snapshot in memory.
///
/// Goes through the same encode/decode path as [`FileStore`](crate::FileStore),
/// so a ledger reopened over the same store behaves like one reopened from
/// disk. Writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bytes: Mutex<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds an encoded snapshot.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes)),
            ..Self::default()
        }
    }

    /// Raw bytes of the current snapshot.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes.lock().clone()
    }

    /// Overwrite the stored bytes directly.
    pub fn set_bytes(&self, bytes: Vec<u8>) {
        *self.bytes.lock() = Some(bytes);
    }

    /// Make subsequent `persist` calls fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<Option<ChainSnapshot>> {
        let bytes = self.bytes.lock().clone();
        bytes.map(|b| ChainSnapshot::from_bytes(&b)).transpose()
    }

    async fn persist(&self, snapshot: &ChainSnapshot) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::storage_write("memory store is rejecting writes"));
        }
        let bytes = snapshot.to_bytes()?;
        *self.bytes.lock() = Some(bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
