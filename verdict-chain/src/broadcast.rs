//! Real-time fan-out of appended blocks.
//!
//! Delivery is best-effort and at-most-once: each subscriber has its own
//! bounded buffer, a subscriber that falls behind skips what it missed and
//! can catch up with range reads, and nothing a subscriber does can block
//! or fail an append.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Sink, SinkExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use verdict_core::{Block, Error, Result};

/// Which blocks a subscriber wants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "types", rename_all = "snake_case")]
pub enum SubscriptionFilter {
    /// Every block.
    #[default]
    All,
    /// Blocks whose type is in the set.
    Types(BTreeSet<String>),
}

impl SubscriptionFilter {
    /// Filter for a single block type.
    pub fn block_type(block_type: impl Into<String>) -> Self {
        Self::Types(BTreeSet::from([block_type.into()]))
    }

    /// Filter for any of the given block types.
    pub fn types<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::Types(types.into_iter().map(Into::into).collect())
    }

    /// Check if a block passes the filter.
    pub fn matches(&self, block: &Block) -> bool {
        match self {
            Self::All => true,
            Self::Types(types) => types.contains(&block.block_type),
        }
    }
}

/// Publishes committed blocks to subscribers.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<Arc<Block>>,
}

impl Broadcaster {
    /// Create a broadcaster buffering `capacity` blocks per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a block. Never blocks; returns how many subscribers it reached.
    pub fn publish(&self, block: &Block) -> usize {
        match self.sender.send(Arc::new(block.clone())) {
            Ok(n) => n,
            // No subscribers
            Err(_) => 0,
        }
    }

    /// Register a new subscriber. It sees blocks published from now on.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        debug!(?filter, "new subscription");
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
            skipped: 0,
        }
    }

    /// Number of live subscriptions, including attached sinks.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Pump matching blocks into a sink on a dedicated task.
    ///
    /// The task ends when the sink fails or the broadcaster goes away; a
    /// failing sink only detaches itself.
    pub fn attach<S>(&self, mut sink: S, filter: SubscriptionFilter) -> JoinHandle<()>
    where
        S: BlockSink + 'static,
    {
        let mut subscription = self.subscribe(filter);
        tokio::spawn(async move {
            let name = sink.name();
            while let Some(block) = subscription.recv().await {
                let index = block.index;
                if let Err(e) = sink.deliver(block).await {
                    warn!(sink = %name, index, error = %e, "sink failed, detaching");
                    return;
                }
            }
            debug!(sink = %name, "broadcaster closed, sink detached");
        })
    }
}

/// A single subscriber's view of the block stream.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<Arc<Block>>,
    filter: SubscriptionFilter,
    skipped: u64,
}

impl Subscription {
    /// Wait for the next matching block.
    ///
    /// Returns `None` once the broadcaster is gone. Blocks lost to lagging
    /// are skipped and counted in [`skipped`](Self::skipped).
    pub async fn recv(&mut self) -> Option<Arc<Block>> {
        loop {
            match self.receiver.recv().await {
                Ok(block) if self.filter.matches(&block) => return Some(block),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged, skipping blocks");
                    self.skipped += n;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next matching block if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Arc<Block>> {
        loop {
            match self.receiver.try_recv() {
                Ok(block) if self.filter.matches(&block) => return Some(block),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged, skipping blocks");
                    self.skipped += n;
                }
                Err(_) => return None,
            }
        }
    }

    /// Number of blocks lost to lagging.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// This subscription's filter.
    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }
}

/// Transport adapter fed by [`Broadcaster::attach`].
#[async_trait]
pub trait BlockSink: Send {
    /// Deliver one block. An error detaches the sink.
    async fn deliver(&mut self, block: Arc<Block>) -> Result<()>;

    /// Name used in logs.
    fn name(&self) -> String {
        "sink".to_string()
    }
}

/// Sink that forwards into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    name: String,
    sender: mpsc::Sender<Arc<Block>>,
}

impl ChannelSink {
    /// Wrap a channel sender.
    pub fn new(name: impl Into<String>, sender: mpsc::Sender<Arc<Block>>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

#[async_trait]
impl BlockSink for ChannelSink {
    async fn deliver(&mut self, block: Arc<Block>) -> Result<()> {
        self.sender
            .send(block)
            .await
            .map_err(|_| Error::internal(format!("{} receiver dropped", self.name)))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Sink over any [`futures::Sink`], e.g. the write half of a socket mapped
/// into blocks with `SinkExt::with`.
pub struct ForwardSink<S> {
    name: String,
    inner: S,
}

impl<S> ForwardSink<S> {
    /// Wrap a sink.
    pub fn new(name: impl Into<String>, inner: S) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl<S> fmt::Debug for ForwardSink<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardSink")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> BlockSink for ForwardSink<S>
where
    S: Sink<Arc<Block>> + Unpin + Send,
    S::Error: fmt::Display,
{
    async fn deliver(&mut self, block: Arc<Block>) -> Result<()> {
        self.inner
            .send(block)
            .await
            .map_err(|e| Error::internal(format!("{}: {}", self.name, e)))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
