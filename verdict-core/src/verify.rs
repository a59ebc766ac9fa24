//! Block and chain verification.
//!
//! Everything here is pure and synchronous so third parties can check an
//! exported chain with nothing but the public key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::block::{canonical_bytes, Block, PreviousHash};
use crate::crypto::{hash, Hash, PublicKey, Sig};
use crate::error::{Error, Result};

/// Why a chain segment failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breakage {
    /// Index does not follow the preceding block.
    IndexGap { expected: u64, found: u64 },
    /// `previousHash` does not equal the preceding block's hash.
    PreviousHashMismatch,
    /// A block at index 0 without the genesis sentinel, or a later block with it.
    GenesisLink,
    /// Stored hash differs from the recomputed canonical hash.
    HashMismatch,
    /// Signature does not verify under the public key.
    BadSignature,
}

impl fmt::Display for Breakage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breakage::IndexGap { expected, found } => {
                write!(f, "index gap (expected {}, found {})", expected, found)
            }
            Breakage::PreviousHashMismatch => f.write_str("previous hash mismatch"),
            Breakage::GenesisLink => f.write_str("invalid genesis link"),
            Breakage::HashMismatch => f.write_str("hash mismatch"),
            Breakage::BadSignature => f.write_str("invalid signature"),
        }
    }
}

/// Outcome of verifying a chain segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentReport {
    /// Whether every block in the segment verified.
    pub valid: bool,
    /// Index of the first offending block.
    pub broken_at_index: Option<u64>,
    /// What was wrong with it.
    pub reason: Option<Breakage>,
    /// Number of blocks that verified before the walk stopped.
    pub checked: usize,
}

impl SegmentReport {
    fn ok(checked: usize) -> Self {
        Self {
            valid: true,
            broken_at_index: None,
            reason: None,
            checked,
        }
    }

    fn broken(index: u64, reason: Breakage, checked: usize) -> Self {
        Self {
            valid: false,
            broken_at_index: Some(index),
            reason: Some(reason),
            checked,
        }
    }

    /// Convert an invalid report into `Error::ChainInvalid`.
    pub fn into_result(self) -> Result<Self> {
        match (&self.broken_at_index, &self.reason) {
            (Some(index), Some(reason)) if !self.valid => {
                Err(Error::chain_invalid(*index, reason.to_string()))
            }
            _ => Ok(self),
        }
    }
}

impl fmt::Display for SegmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.broken_at_index, &self.reason) {
            (Some(index), Some(reason)) => {
                write!(f, "chain invalid at index {}: {}", index, reason)
            }
            _ => write!(f, "chain valid ({} blocks checked)", self.checked),
        }
    }
}

/// Verify a single block's hash and signature.
///
/// Returns `false` for tampered blocks and for blocks whose signature was
/// produced by a different key.
pub fn verify_block_signature(block: &Block, public_key: &PublicKey) -> bool {
    block.compute_hash() == block.hash && public_key.verify_hash(&block.hash, &block.signature)
}

/// Verify a block given as untyped JSON.
///
/// Missing or ill-typed fields are an error. Values that are present but do
/// not decode (bad hex, out-of-range timestamps) mean the record cannot be
/// authentic and yield `Ok(false)`.
pub fn verify_block_value(value: &Value, public_key: &PublicKey) -> Result<bool> {
    let record = value
        .as_object()
        .ok_or_else(|| Error::invalid_format("block must be a JSON object"))?;

    let index = required(record, "index")?
        .as_u64()
        .ok_or_else(|| Error::invalid_format("index must be a non-negative integer"))?;
    let millis = required(record, "timestamp")?
        .as_i64()
        .ok_or_else(|| Error::invalid_format("timestamp must be an integer"))?;
    let block_type = required_str(record, "type")?;
    let payload = required(record, "payload")?;
    let previous = required_str(record, "previousHash")?;
    let stored_hash = required_str(record, "hash")?;
    let signature = required_str(record, "signature")?;

    let Some(timestamp) = DateTime::<Utc>::from_timestamp_millis(millis) else {
        return Ok(false);
    };
    let Ok(previous) = PreviousHash::parse(previous) else {
        return Ok(false);
    };
    let Ok(stored_hash) = Hash::from_hex(stored_hash) else {
        return Ok(false);
    };
    let Ok(signature) = Sig::from_hex(signature) else {
        return Ok(false);
    };

    let computed = hash(&canonical_bytes(
        index, &timestamp, block_type, payload, &previous,
    ));
    Ok(computed == stored_hash && public_key.verify_hash(&stored_hash, &signature))
}

fn required<'a>(record: &'a Map<String, Value>, field: &str) -> Result<&'a Value> {
    record
        .get(field)
        .ok_or_else(|| Error::invalid_format(format!("missing field '{}'", field)))
}

fn required_str<'a>(record: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    required(record, field)?
        .as_str()
        .ok_or_else(|| Error::invalid_format(format!("field '{}' must be a string", field)))
}

/// Check how a block attaches to the one before it.
fn check_link(block: &Block, preceding: Option<&Block>) -> Option<Breakage> {
    match preceding {
        Some(prev) => {
            if block.index != prev.index + 1 {
                return Some(Breakage::IndexGap {
                    expected: prev.index + 1,
                    found: block.index,
                });
            }
            if !block.previous_hash.points_to(prev) {
                return Some(Breakage::PreviousHashMismatch);
            }
            None
        }
        None if block.index == 0 && block.previous_hash != PreviousHash::Genesis => {
            Some(Breakage::GenesisLink)
        }
        None if block.index > 0 && block.previous_hash == PreviousHash::Genesis => {
            Some(Breakage::GenesisLink)
        }
        None => None,
    }
}

/// Verify a contiguous run of blocks.
///
/// `preceding` is the block immediately before `blocks[0]`, when known. The
/// walk stops at the first failure; `broken_at_index` is the position the
/// offending block should occupy, so a tampered index is reported where it
/// was found rather than where it claims to be.
pub fn verify_chain_segment(
    blocks: &[Block],
    preceding: Option<&Block>,
    public_key: &PublicKey,
) -> SegmentReport {
    walk_segment(blocks, preceding, |block| check_integrity(block, public_key))
}

/// Verify a contiguous run of blocks, checking hashes and signatures in
/// parallel.
///
/// Produces the same report as [`verify_chain_segment`]. Worth it for long
/// segments where signature verification dominates.
pub fn verify_chain_segment_parallel(
    blocks: &[Block],
    preceding: Option<&Block>,
    public_key: &PublicKey,
) -> SegmentReport {
    use rayon::prelude::*;

    let integrity: Vec<Option<Breakage>> = blocks
        .par_iter()
        .map(|block| check_integrity(block, public_key))
        .collect();

    let mut results = integrity.into_iter();
    walk_segment(blocks, preceding, |_| results.next().flatten())
}

/// Hash and signature checks for one block.
fn check_integrity(block: &Block, public_key: &PublicKey) -> Option<Breakage> {
    if block.compute_hash() != block.hash {
        return Some(Breakage::HashMismatch);
    }
    if !public_key.verify_hash(&block.hash, &block.signature) {
        return Some(Breakage::BadSignature);
    }
    None
}

fn walk_segment<F>(blocks: &[Block], preceding: Option<&Block>, mut integrity: F) -> SegmentReport
where
    F: FnMut(&Block) -> Option<Breakage>,
{
    let mut prev = preceding;

    for (checked, block) in blocks.iter().enumerate() {
        let position = prev.map(|p| p.index + 1).unwrap_or(block.index);

        if let Some(breakage) = integrity(block).or_else(|| check_link(block, prev)) {
            return SegmentReport::broken(position, breakage, checked);
        }

        prev = Some(block);
    }

    SegmentReport::ok(blocks.len())
}
