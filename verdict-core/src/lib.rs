//! Verdict Core - Fundamental types for the Verdict decision ledger.
//!
//! This crate provides the data structures and cryptographic primitives
//! shared by the rest of the workspace:
//!
//! - [`crypto`] - Hashing (BLAKE3) and signatures (Ed25519)
//! - [`block`] - Blocks and the canonical hash
//! - [`signer`] - The [`KeyProvider`] signing contract
//! - [`verify`] - Pure block and chain verification
//!
//! # Example
//!
//! ```rust
//! use verdict_core::{
//!     block::BlockBuilder,
//!     crypto::SecretKey,
//!     verify::{verify_block_signature, verify_chain_segment},
//! };
//!
//! let key = SecretKey::generate();
//!
//! let genesis = BlockBuilder::genesis("example", &key.public_key())
//!     .seal(&key)
//!     .unwrap();
//! let block = BlockBuilder::new("approval_requested")
//!     .parent(&genesis)
//!     .payload(serde_json::json!({ "id": "x1" }))
//!     .seal(&key)
//!     .unwrap();
//!
//! assert!(verify_block_signature(&block, &key.public_key()));
//! assert!(verify_chain_segment(&[genesis, block], None, &key.public_key()).valid);
//! ```

pub mod block;
pub mod crypto;
pub mod error;
pub mod metrics;
pub mod signer;
pub mod verify;

#[cfg(test)]
mod proptest;

// Re-exports for convenience
pub use block::{
    canonical_bytes, genesis_payload, Block, BlockBuilder, PreviousHash, UnsignedBlock,
    GENESIS_PREVIOUS_HASH, GENESIS_TYPE,
};
pub use crypto::{hash, Hash, PublicKey, SecretKey, Sig};
pub use error::{Error, ErrorCode, Result};
pub use metrics::MetricsSnapshot;
pub use signer::{KeyProvider, LocalKeyProvider};
pub use verify::{
    verify_block_signature, verify_block_value, verify_chain_segment,
    verify_chain_segment_parallel, Breakage, SegmentReport,
};
