//! The persisted chain snapshot.
//!
//! # Format
//!
//! A snapshot is a single JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "genesis": { ...block... },
//!   "blocks": [ ...every block after genesis... ],
//!   "metrics": { ...MetricsSnapshot... },
//!   "lastUpdated": 1700000000000
//! }
//! ```
//!
//! Blocks use the same camelCase JSON as the rest of the system, so the file
//! can be verified by tools that only know the canonical hash rules.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use verdict_core::{Block, Error, MetricsSnapshot, Result};

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full durable state of a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSnapshot {
    /// Format version.
    pub version: u32,
    /// Block 0.
    pub genesis: Block,
    /// Blocks 1..n in order.
    pub blocks: Vec<Block>,
    /// Counters at the time of the snapshot.
    pub metrics: MetricsSnapshot,
    /// When the snapshot was taken.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl ChainSnapshot {
    /// Build a snapshot from a full chain, genesis first.
    pub fn from_chain(chain: &[Block], metrics: MetricsSnapshot) -> Result<Self> {
        let (genesis, blocks) = chain
            .split_first()
            .ok_or_else(|| Error::invalid_block("cannot snapshot an empty chain"))?;
        if !genesis.is_genesis() {
            return Err(Error::invalid_block("snapshot must start at the genesis block"));
        }

        Ok(Self {
            version: SNAPSHOT_VERSION,
            genesis: genesis.clone(),
            blocks: blocks.to_vec(),
            metrics,
            last_updated: Utc::now(),
        })
    }

    /// Check the header fields.
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::storage_corruption(format!(
                "unsupported snapshot version: {}",
                self.version
            )));
        }
        if !self.genesis.is_genesis() {
            return Err(Error::storage_corruption(
                "snapshot genesis is not a genesis block",
            ));
        }
        Ok(())
    }

    /// Number of blocks including genesis.
    pub fn len(&self) -> usize {
        self.blocks.len() + 1
    }

    /// A snapshot always holds at least genesis.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The most recent block.
    pub fn tail(&self) -> &Block {
        self.blocks.last().unwrap_or(&self.genesis)
    }

    /// Iterate over every block, genesis first.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        std::iter::once(&self.genesis).chain(self.blocks.iter())
    }

    /// Consume the snapshot into the full ordered chain.
    pub fn into_chain(self) -> Vec<Block> {
        let mut chain = Vec::with_capacity(self.blocks.len() + 1);
        chain.push(self.genesis);
        chain.extend(self.blocks);
        chain
    }

    /// Encode to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode and validate from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::storage_corruption(format!("malformed snapshot: {}", e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Write to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        writer.flush()?;
        Ok(())
    }

    /// Read from a reader.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use verdict_core::{BlockBuilder, ErrorCode, SecretKey};

    fn chain(n: usize) -> Vec<Block> {
        let key = SecretKey::generate();
        let mut chain = vec![BlockBuilder::genesis("snap", &key.public_key())
            .seal(&key)
            .unwrap()];
        for i in 1..n {
            let b = BlockBuilder::new("decision")
                .parent(chain.last().unwrap())
                .payload(json!({ "i": i }))
                .seal(&key)
                .unwrap();
            chain.push(b);
        }
        chain
    }

    #[test]
    fn test_from_chain_splits_genesis() {
        let chain = chain(4);
        let snapshot = ChainSnapshot::from_chain(&chain, MetricsSnapshot::default()).unwrap();

        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.genesis, chain[0]);
        assert_eq!(snapshot.blocks.len(), 3);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.tail(), &chain[3]);
        assert_eq!(snapshot.iter().count(), 4);
        assert_eq!(snapshot.into_chain(), chain);
    }

    #[test]
    fn test_from_chain_requires_genesis() {
        assert!(ChainSnapshot::from_chain(&[], MetricsSnapshot::default()).is_err());

        let chain = chain(3);
        assert!(ChainSnapshot::from_chain(&chain[1..], MetricsSnapshot::default()).is_err());
    }

    #[test]
    fn test_json_shape() {
        let chain = chain(2);
        let snapshot = ChainSnapshot::from_chain(&chain, MetricsSnapshot::default()).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&snapshot.to_bytes().unwrap()).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["genesis"]["previousHash"], "0");
        assert_eq!(value["blocks"][0]["index"], 1);
        assert!(value["lastUpdated"].is_i64());
        assert!(value["metrics"].is_object());
    }

    #[test]
    fn test_write_read_roundtrip() {
        let chain = chain(3);
        let snapshot = ChainSnapshot::from_chain(&chain, MetricsSnapshot::default()).unwrap();

        let mut buf = Vec::new();
        snapshot.write(&mut buf).unwrap();
        let restored = ChainSnapshot::read(&mut buf.as_slice()).unwrap();

        assert_eq!(restored.genesis, snapshot.genesis);
        assert_eq!(restored.blocks, snapshot.blocks);
        assert_eq!(
            restored.last_updated.timestamp_millis(),
            snapshot.last_updated.timestamp_millis()
        );
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let chain = chain(1);
        let mut snapshot = ChainSnapshot::from_chain(&chain, MetricsSnapshot::default()).unwrap();
        snapshot.version = 99;
        let bytes = serde_json::to_vec(&snapshot).unwrap();

        let err = ChainSnapshot::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StorageCorruption);
    }

    #[test]
    fn test_garbage_is_corruption() {
        let err = ChainSnapshot::from_bytes(b"{ not json").unwrap_err();
        assert_eq!(err.code(), ErrorCode::StorageCorruption);
    }
}
