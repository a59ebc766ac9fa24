//! Storage traits.

use async_trait::async_trait;
use verdict_core::Result;

use crate::snapshot::ChainSnapshot;

/// Durable home for the chain snapshot.
///
/// `persist` replaces the previous snapshot as a whole: after it returns
/// `Ok`, a subsequent `load` (in this or a later process) yields the new
/// snapshot, and a crash during `persist` leaves the previous one intact.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last persisted snapshot, if any.
    async fn load(&self) -> Result<Option<ChainSnapshot>>;

    /// Durably replace the snapshot.
    async fn persist(&self, snapshot: &ChainSnapshot) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
