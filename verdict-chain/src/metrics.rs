//! Running counters over the append stream.

use std::time::Duration;

use parking_lot::RwLock;
use verdict_core::{Block, MetricsSnapshot};

/// Derived counters. A cache only: [`replay`](Self::replay) rebuilds every
/// reproducible field from the chain.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    state: RwLock<MetricsSnapshot>,
}

fn apply(snapshot: &mut MetricsSnapshot, block: &Block) {
    snapshot.total_blocks += 1;
    *snapshot
        .blocks_by_type
        .entry(block.block_type.clone())
        .or_insert(0) += 1;
    snapshot.last_index = Some(block.index);
    snapshot.last_append_at = Some(block.timestamp);
}

impl MetricsAggregator {
    /// Empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild counters from a chain, genesis first.
    pub fn replay<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Self {
        let mut snapshot = MetricsSnapshot::default();
        for block in blocks {
            apply(&mut snapshot, block);
        }
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Record a committed block.
    pub fn record(&self, block: &Block, elapsed: Duration) {
        let mut state = self.state.write();
        apply(&mut state, block);
        state.last_append_duration_ms = Some(elapsed.as_millis() as u64);
    }

    /// Counters as they will be once `block` is recorded, without recording it.
    pub fn projected(&self, block: &Block) -> MetricsSnapshot {
        let mut snapshot = self.state.read().clone();
        apply(&mut snapshot, block);
        snapshot
    }

    /// Current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.read().clone()
    }
}
