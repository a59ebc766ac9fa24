//! Storage layer for Verdict.
//!
//! The ledger is persisted as one snapshot document holding the genesis
//! block, every later block, and the derived metrics. Stores implement
//! [`SnapshotStore`]:
//!
//! - [`FileStore`] - atomic whole-file writes (temp file, fsync, rename)
//! - [`MemoryStore`] - encoded bytes kept in memory
//!
//! ```ignore
//! use verdict_storage::{ChainSnapshot, FileStore, SnapshotStore};
//!
//! let store = FileStore::new("./data/chain.json");
//! store.persist(&ChainSnapshot::from_chain(&chain, metrics)?).await?;
//!
//! if let Some(snapshot) = store.load().await? {
//!     println!("{} blocks", snapshot.len());
//! }
//! ```

mod file;
mod memory;
pub mod snapshot;
mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use snapshot::{ChainSnapshot, SNAPSHOT_VERSION};
pub use traits::SnapshotStore;

// Re-export core types for convenience
pub use verdict_core::{Error, Result};
