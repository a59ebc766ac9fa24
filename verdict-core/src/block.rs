//! Block types for Verdict.
//!
//! A block records one decision and links to its predecessor by hash.
//!
//! # Canonical hash
//!
//! The digest of a block is BLAKE3-256 over the UTF-8 bytes of the compact
//! JSON array
//!
//! ```text
//! [index, timestampMillis, type, payload, previousHash]
//! ```
//!
//! `index` and `timestampMillis` are JSON integers, `type` and
//! `previousHash` are JSON strings (`previousHash` is lowercase hex, or `"0"`
//! for genesis), and `payload` is written with object keys sorted by byte
//! value and no whitespace. Field order comes from the array position alone,
//! so any implementation that follows these rules reproduces the digest.
//!
//! Numbers are written as they appear in the payload. Integers use plain
//! decimal. Non-integers use the shortest decimal form that reads back as
//! the same `f64`: a fraction always carries a `.` (`1.0`, `0.1`) and the
//! exponent form is `<mantissa>e<exp>` with no `+` and no leading zeros
//! (`1e20`, `1.0715660391465826e-75`). Payload numbers are parsed with
//! exact float round-tripping, so a block read back from a snapshot
//! re-encodes to the bytes it was signed over.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::crypto::{hash, Hash, PublicKey, SecretKey, Sig};
use crate::error::{Error, Result};

/// Sentinel stored as the genesis block's `previousHash`.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Type tag of the genesis block.
pub const GENESIS_TYPE: &str = "genesis";

/// Link from a block to its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviousHash {
    /// The block is the genesis block.
    Genesis,
    /// Hash of the preceding block.
    Block(Hash),
}

impl PreviousHash {
    /// Parse the persisted form (`"0"` or 64 hex characters).
    pub fn parse(s: &str) -> Result<Self> {
        if s == GENESIS_PREVIOUS_HASH {
            Ok(Self::Genesis)
        } else {
            Hash::from_hex(s).map(Self::Block)
        }
    }

    /// The predecessor hash, if any.
    pub fn hash(&self) -> Option<&Hash> {
        match self {
            Self::Genesis => None,
            Self::Block(h) => Some(h),
        }
    }

    /// Check whether this links to the given block.
    pub fn points_to(&self, block: &Block) -> bool {
        self.hash() == Some(&block.hash)
    }
}

impl fmt::Display for PreviousHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Genesis => f.write_str(GENESIS_PREVIOUS_HASH),
            Self::Block(h) => write!(f, "{}", h),
        }
    }
}

impl Serialize for PreviousHash {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PreviousHash {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        PreviousHash::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A signed, hash-linked ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Position in the chain, starting at 0.
    pub index: u64,

    /// Creation time, as Unix millis.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Event classification tag.
    #[serde(rename = "type")]
    pub block_type: String,

    /// Opaque decision data.
    pub payload: Value,

    /// Link to the preceding block.
    pub previous_hash: PreviousHash,

    /// Canonical digest of the fields above.
    pub hash: Hash,

    /// Signature over `hash`.
    pub signature: Sig,
}

impl Block {
    /// Bytes the canonical hash is computed over.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_bytes(
            self.index,
            &self.timestamp,
            &self.block_type,
            &self.payload,
            &self.previous_hash,
        )
    }

    /// Recompute the canonical hash from the block's fields.
    pub fn compute_hash(&self) -> Hash {
        hash(&self.canonical_bytes())
    }

    /// Check whether this is a genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == PreviousHash::Genesis
    }

    /// Public key recorded in a genesis payload.
    pub fn genesis_public_key(&self) -> Option<PublicKey> {
        if !self.is_genesis() {
            return None;
        }
        self.payload
            .get("publicKey")
            .and_then(Value::as_str)
            .and_then(|s| PublicKey::from_hex(s).ok())
    }
}

/// Canonical encoding of a block's hashed fields.
pub fn canonical_bytes(
    index: u64,
    timestamp: &DateTime<Utc>,
    block_type: &str,
    payload: &Value,
    previous_hash: &PreviousHash,
) -> Vec<u8> {
    let mut out = String::with_capacity(128);
    out.push('[');
    out.push_str(&index.to_string());
    out.push(',');
    out.push_str(&timestamp.timestamp_millis().to_string());
    out.push(',');
    write_canonical(&Value::from(block_type), &mut out);
    out.push(',');
    write_canonical(payload, &mut out);
    out.push(',');
    write_canonical(&Value::from(previous_hash.to_string()), &mut out);
    out.push(']');
    out.into_bytes()
}

/// Write a JSON value with sorted object keys, independent of map ordering.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Payload of the genesis block: system identity plus the signing key.
pub fn genesis_payload(system_id: &str, public_key: &PublicKey) -> Value {
    serde_json::json!({
        "system": system_id,
        "version": env!("CARGO_PKG_VERSION"),
        "publicKey": public_key.to_hex(),
    })
}

/// Truncate to the millisecond precision the chain persists.
fn to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// A fully hashed block awaiting its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedBlock {
    index: u64,
    timestamp: DateTime<Utc>,
    block_type: String,
    payload: Value,
    previous_hash: PreviousHash,
    hash: Hash,
}

impl UnsignedBlock {
    /// Index the block will occupy.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Canonical hash the signature must cover.
    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    /// Predecessor link.
    pub fn previous_hash(&self) -> &PreviousHash {
        &self.previous_hash
    }

    /// Attach a signature produced elsewhere.
    pub fn with_signature(self, signature: Sig) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            block_type: self.block_type,
            payload: self.payload,
            previous_hash: self.previous_hash,
            hash: self.hash,
            signature,
        }
    }

    /// Sign with a local key.
    pub fn sign(self, key: &SecretKey) -> Block {
        let signature = key.sign_hash(&self.hash);
        self.with_signature(signature)
    }
}

/// Builder for creating blocks.
pub struct BlockBuilder {
    parent: Option<(u64, Hash, DateTime<Utc>)>,
    block_type: String,
    payload: Value,
    timestamp: Option<DateTime<Utc>>,
}

impl BlockBuilder {
    /// Create a builder for a block of the given type.
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            parent: None,
            block_type: block_type.into(),
            payload: Value::Null,
            timestamp: None,
        }
    }

    /// Create a builder for the genesis block.
    pub fn genesis(system_id: &str, public_key: &PublicKey) -> Self {
        Self::new(GENESIS_TYPE).payload(genesis_payload(system_id, public_key))
    }

    /// Set the parent block.
    pub fn parent(mut self, parent: &Block) -> Self {
        self.parent = Some((parent.index, parent.hash, parent.timestamp));
        self
    }

    /// Set the payload.
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Override the creation time (defaults to now).
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Compute the canonical hash and produce an unsigned block.
    pub fn build(self) -> Result<UnsignedBlock> {
        if self.block_type.trim().is_empty() {
            return Err(Error::invalid_block("block type must not be empty"));
        }

        let mut timestamp = to_millis(self.timestamp.unwrap_or_else(Utc::now));
        let (index, previous_hash) = match self.parent {
            Some((height, parent_hash, parent_time)) => {
                // Never stamp a block earlier than its parent.
                if timestamp < parent_time {
                    timestamp = parent_time;
                }
                (height + 1, PreviousHash::Block(parent_hash))
            }
            None => (0, PreviousHash::Genesis),
        };

        let hash = hash(&canonical_bytes(
            index,
            &timestamp,
            &self.block_type,
            &self.payload,
            &previous_hash,
        ));

        Ok(UnsignedBlock {
            index,
            timestamp,
            block_type: self.block_type,
            payload: self.payload,
            previous_hash,
            hash,
        })
    }

    /// Build and sign with a local key.
    pub fn seal(self, key: &SecretKey) -> Result<Block> {
        Ok(self.build()?.sign(key))
    }
}
