//! The ledger: append path and query surface.
//!
//! An append runs as one critical section under the chain writer:
//!
//! ```text
//! writer() -> factory builds + signs on the tail -> persist snapshot
//!          -> commit -> record metrics -> publish -> release writer
//! ```
//!
//! The snapshot that contains block `i` is durable before block `i` is
//! visible to readers, and before block `i + 1` can be built. The section
//! runs on its own task, so dropping the caller's future does not stop an
//! append halfway through.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use verdict_core::{
    verify_chain_segment, verify_chain_segment_parallel, Block, Error, KeyProvider,
    MetricsSnapshot, PublicKey, Result, SegmentReport,
};
use verdict_storage::{ChainSnapshot, FileStore, MemoryStore, SnapshotStore};

use crate::broadcast::{BlockSink, Broadcaster, Subscription, SubscriptionFilter};
use crate::config::LedgerConfig;
use crate::factory::BlockFactory;
use crate::metrics::MetricsAggregator;
use crate::store::ChainStore;

struct Inner {
    config: LedgerConfig,
    store: Arc<ChainStore>,
    factory: BlockFactory,
    persistence: Arc<dyn SnapshotStore>,
    broadcaster: Broadcaster,
    metrics: MetricsAggregator,
}

/// Handle to an open ledger. Cheap to clone.
#[derive(Clone)]
pub struct Ledger {
    inner: Arc<Inner>,
}

impl Ledger {
    /// Open the ledger described by `config`.
    ///
    /// Uses a [`FileStore`] when `snapshot_path` is set and a fresh
    /// [`MemoryStore`] otherwise.
    pub async fn open(config: LedgerConfig, provider: Arc<dyn KeyProvider>) -> Result<Self> {
        let persistence: Arc<dyn SnapshotStore> = match &config.snapshot_path {
            Some(path) => Arc::new(FileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        Self::open_with_store(config, provider, persistence).await
    }

    /// Open over an explicit snapshot store.
    ///
    /// Loads and re-verifies an existing snapshot, or creates and persists a
    /// genesis block if the store is empty.
    pub async fn open_with_store(
        config: LedgerConfig,
        provider: Arc<dyn KeyProvider>,
        persistence: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        config.validate()?;
        let factory = BlockFactory::new(provider);
        let public_key = *factory.public_key();

        let chain = match persistence.load().await? {
            Some(snapshot) => {
                let chain = snapshot.into_chain();
                check_genesis_key(&chain[0], &public_key)?;

                if config.verify_on_open {
                    let report = verify_chain_segment_parallel(&chain, None, &public_key);
                    if !report.valid {
                        warn!(store = %persistence.describe(), %report, "persisted chain failed verification");
                    }
                    report.into_result()?;
                }

                info!(
                    store = %persistence.describe(),
                    blocks = chain.len(),
                    tail = %chain[chain.len() - 1].hash,
                    "opened ledger"
                );
                chain
            }
            None => {
                let genesis = factory.genesis(&config.system_id).await?;
                let chain = vec![genesis];
                let metrics = MetricsAggregator::replay(&chain).snapshot();
                persistence
                    .persist(&ChainSnapshot::from_chain(&chain, metrics)?)
                    .await?;

                info!(
                    store = %persistence.describe(),
                    system = %config.system_id,
                    hash = %chain[0].hash,
                    "created genesis block"
                );
                chain
            }
        };

        let metrics = MetricsAggregator::replay(&chain);
        let store = Arc::new(ChainStore::from_blocks(chain, public_key)?);
        let broadcaster = Broadcaster::new(config.broadcast_capacity);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                factory,
                persistence,
                broadcaster,
                metrics,
            }),
        })
    }

    /// Record a decision as the next block.
    ///
    /// Either the returned block is durably appended, verified and
    /// published, or the chain is unchanged.
    pub async fn append_block(
        &self,
        block_type: impl Into<String>,
        payload: Value,
    ) -> Result<Block> {
        let inner = Arc::clone(&self.inner);
        let block_type = block_type.into();
        tokio::spawn(async move { inner.append(block_type, payload).await })
            .await
            .map_err(|e| Error::internal(format!("append task failed: {}", e)))?
    }

    /// Most recent block.
    pub fn tail(&self) -> Block {
        self.inner.store.tail()
    }

    /// Block at the given index.
    pub fn by_index(&self, index: u64) -> Option<Block> {
        self.inner.store.by_index(index)
    }

    /// Up to `count` blocks starting at `offset`.
    pub fn range(&self, offset: u64, count: usize) -> Vec<Block> {
        self.inner.store.slice(offset, count)
    }

    /// Number of blocks including genesis.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Always false: an open ledger holds genesis.
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Key every block verifies under.
    pub fn public_key(&self) -> &PublicKey {
        self.inner.store.public_key()
    }

    /// Configuration the ledger was opened with.
    pub fn config(&self) -> &LedgerConfig {
        &self.inner.config
    }

    /// Verify blocks `from..=to`, including their link to block `from - 1`.
    pub fn verify_range(&self, from: u64, to: u64) -> Result<SegmentReport> {
        if from > to {
            return Err(Error::invalid_format(format!(
                "invalid range: from {} is after to {}",
                from, to
            )));
        }
        let len = self.len() as u64;
        if to >= len {
            return Err(Error::block_not_found(format!(
                "block {} is past the tail (length {})",
                to, len
            )));
        }

        let preceding = from.checked_sub(1).and_then(|i| self.by_index(i));
        let count = usize::try_from(to - from + 1)
            .map_err(|_| Error::invalid_format("range too large"))?;
        let blocks = self.range(from, count);

        let report = verify_chain_segment(&blocks, preceding.as_ref(), self.public_key());
        self.log_report(&report);
        Ok(report)
    }

    /// Verify the whole chain from genesis.
    pub fn verify_all(&self) -> SegmentReport {
        let blocks = self.inner.store.blocks();
        let report = verify_chain_segment_parallel(&blocks, None, self.public_key());
        self.log_report(&report);
        report
    }

    /// Spot-check every block matching `predicate`, each against its own
    /// predecessor. `checked` counts the matching blocks.
    pub fn verify_matching<F>(&self, predicate: F) -> SegmentReport
    where
        F: Fn(&Block) -> bool,
    {
        let blocks = self.inner.store.blocks();
        let public_key = self.public_key();
        let mut checked = 0;

        for (i, block) in blocks.iter().enumerate() {
            if !predicate(block) {
                continue;
            }
            let preceding = i.checked_sub(1).map(|p| &blocks[p]);
            let report = verify_chain_segment(std::slice::from_ref(block), preceding, public_key);
            if !report.valid {
                let report = SegmentReport { checked, ..report };
                self.log_report(&report);
                return report;
            }
            checked += 1;
        }

        SegmentReport {
            valid: true,
            broken_at_index: None,
            reason: None,
            checked,
        }
    }

    /// Current counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Subscribe to blocks appended from now on.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        self.inner.broadcaster.subscribe(filter)
    }

    /// Feed appended blocks into a sink on its own task.
    pub fn attach<S>(&self, sink: S, filter: SubscriptionFilter) -> JoinHandle<()>
    where
        S: BlockSink + 'static,
    {
        self.inner.broadcaster.attach(sink, filter)
    }

    /// Live subscriptions and sinks.
    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcaster.subscriber_count()
    }

    fn log_report(&self, report: &SegmentReport) {
        if !report.valid {
            warn!(%report, "chain verification failed");
        }
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("system_id", &self.inner.config.system_id)
            .field("store", &self.inner.persistence.describe())
            .field("len", &self.len())
            .finish()
    }
}

impl Inner {
    async fn append(&self, block_type: String, payload: Value) -> Result<Block> {
        let started = Instant::now();
        let mut writer = self.store.writer().await;

        let tail = writer.tail();
        let block = self.factory.next(&tail, block_type, payload).await?;

        let mut chain = writer.blocks();
        chain.push(block.clone());
        let snapshot = ChainSnapshot::from_chain(&chain, self.metrics.projected(&block))?;
        if let Err(e) = self.persistence.persist(&snapshot).await {
            error!(index = block.index, error = %e, "failed to persist block, append aborted");
            return Err(e);
        }

        writer.commit(block.clone())?;
        self.metrics.record(&block, started.elapsed());
        let reached = self.broadcaster.publish(&block);

        info!(
            index = block.index,
            block_type = %block.block_type,
            hash = %block.hash,
            subscribers = reached,
            "appended block"
        );
        Ok(block)
    }
}

fn check_genesis_key(genesis: &Block, public_key: &PublicKey) -> Result<()> {
    match genesis.genesis_public_key() {
        Some(key) if &key == public_key => Ok(()),
        Some(key) => Err(Error::invalid_key(format!(
            "snapshot was created by key {} but the provider signs with {}",
            key, public_key
        ))),
        None => Err(Error::invalid_key("snapshot genesis does not record a public key")),
    }
}
