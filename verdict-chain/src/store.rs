//! In-memory chain with single-writer discipline.
//!
//! Readers take a short read lock and never wait on a writer that is
//! signing or persisting. The writer is a [`ChainWriter`] guard; only the
//! guard can commit, and at most one exists at a time.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use verdict_core::{Block, Error, PublicKey, Result};

/// Ordered, append-only sequence of blocks.
#[derive(Debug)]
pub struct ChainStore {
    public_key: PublicKey,
    blocks: RwLock<Vec<Block>>,
    write_lock: Arc<Mutex<()>>,
}

impl ChainStore {
    /// Create a store over an existing chain, genesis first.
    pub fn from_blocks(blocks: Vec<Block>, public_key: PublicKey) -> Result<Self> {
        match blocks.first() {
            Some(genesis) if genesis.is_genesis() => {}
            Some(_) => return Err(Error::invalid_block("chain must start at genesis")),
            None => return Err(Error::invalid_block("chain must contain a genesis block")),
        }

        Ok(Self {
            public_key,
            blocks: RwLock::new(blocks),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Key the chain verifies under.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Number of blocks including genesis.
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    /// A store always holds genesis.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Most recently committed block.
    pub fn tail(&self) -> Block {
        let blocks = self.blocks.read();
        // Never empty: construction requires genesis and nothing removes blocks.
        blocks[blocks.len() - 1].clone()
    }

    /// Block at the given index.
    pub fn by_index(&self, index: u64) -> Option<Block> {
        let i = usize::try_from(index).ok()?;
        self.blocks.read().get(i).cloned()
    }

    /// Up to `count` blocks starting at `offset`. Empty past the end.
    pub fn slice(&self, offset: u64, count: usize) -> Vec<Block> {
        let blocks = self.blocks.read();
        let start = match usize::try_from(offset) {
            Ok(start) if start < blocks.len() => start,
            _ => return Vec::new(),
        };
        let end = start.saturating_add(count).min(blocks.len());
        blocks[start..end].to_vec()
    }

    /// Copy of the whole chain.
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.read().clone()
    }

    /// Acquire the single writer, waiting for any other writer to finish.
    pub async fn writer(self: &Arc<Self>) -> ChainWriter {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        ChainWriter {
            store: Arc::clone(self),
            _guard: guard,
        }
    }
}

/// Exclusive right to extend the chain.
///
/// The tail seen through a writer cannot change until the writer commits or
/// is dropped.
#[derive(Debug)]
pub struct ChainWriter {
    store: Arc<ChainStore>,
    _guard: OwnedMutexGuard<()>,
}

impl ChainWriter {
    /// Current tail.
    pub fn tail(&self) -> Block {
        self.store.tail()
    }

    /// Copy of the whole chain.
    pub fn blocks(&self) -> Vec<Block> {
        self.store.blocks()
    }

    /// Append a block that directly follows the tail.
    pub fn commit(&mut self, block: Block) -> Result<()> {
        let mut blocks = self.store.blocks.write();
        let tail = &blocks[blocks.len() - 1];

        if block.index != tail.index + 1 {
            return Err(Error::fork(format!(
                "block index {} does not follow tail index {}",
                block.index, tail.index
            )));
        }
        if !block.previous_hash.points_to(tail) {
            return Err(Error::fork(format!(
                "block {} does not link to tail {}",
                block.index, tail.hash
            )));
        }

        debug!(index = block.index, hash = %block.hash, "committed block");
        blocks.push(block);
        Ok(())
    }
}
