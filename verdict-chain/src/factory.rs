//! Block factory: builds and signs the next block.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use verdict_core::{
    Block, BlockBuilder, Error, KeyProvider, PublicKey, Result, UnsignedBlock,
};

/// Builds candidate blocks on top of a tail and obtains their signatures.
///
/// The factory never touches the chain; callers hold the chain writer while
/// using it so the tail cannot move underneath them.
#[derive(Clone)]
pub struct BlockFactory {
    provider: Arc<dyn KeyProvider>,
    public_key: PublicKey,
}

impl BlockFactory {
    /// Create a factory signing with the given provider.
    pub fn new(provider: Arc<dyn KeyProvider>) -> Self {
        let public_key = provider.public_key();
        Self {
            provider,
            public_key,
        }
    }

    /// Key every produced block verifies under.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Build and sign the genesis block.
    pub async fn genesis(&self, system_id: &str) -> Result<Block> {
        let unsigned = BlockBuilder::genesis(system_id, &self.public_key).build()?;
        self.sign(unsigned).await
    }

    /// Build and sign the block that follows `tail`.
    pub async fn next(&self, tail: &Block, block_type: String, payload: Value) -> Result<Block> {
        let unsigned = BlockBuilder::new(block_type)
            .parent(tail)
            .payload(payload)
            .build()?;
        self.sign(unsigned).await
    }

    async fn sign(&self, unsigned: UnsignedBlock) -> Result<Block> {
        let digest = *unsigned.hash();
        let signature = self.provider.sign(&digest).await.map_err(|e| match e {
            Error::Signing { .. } => e,
            other => Error::signing(other.to_string()),
        })?;

        if !self.public_key.verify_hash(&digest, &signature) {
            warn!(index = unsigned.index(), hash = %digest, "key provider returned an invalid signature");
            return Err(Error::signing(
                "key provider returned a signature that does not verify",
            ));
        }

        debug!(index = unsigned.index(), hash = %digest, "signed block");
        Ok(unsigned.with_signature(signature))
    }
}

impl std::fmt::Debug for BlockFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFactory")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
