//! Chain operations for the Verdict decision ledger.
//!
//! This crate turns decision events into signed, hash-linked blocks:
//! - Block factory (build on the tail, sign through a [`KeyProvider`](verdict_core::KeyProvider))
//! - Chain store (single writer, many readers)
//! - Ledger (append path, persistence ordering, queries, verification)
//! - Broadcaster (real-time fan-out to subscribers and sinks)
//! - Metrics aggregator (counters rebuilt from the chain on open)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Ledger                           │
//! │  (append_block, tail/range/by_index, verify_*)          │
//! └─────────────────────────────────────────────────────────┘
//!          │                  │                  │
//!          ▼                  ▼                  ▼
//! ┌─────────────────┐ ┌───────────────┐ ┌─────────────────┐
//! │  BlockFactory   │ │  ChainStore   │ │  SnapshotStore  │
//! │ (build + sign)  │ │ (ChainWriter) │ │ (durable copy)  │
//! └─────────────────┘ └───────────────┘ └─────────────────┘
//!                             │
//!                             ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │           Broadcaster  +  MetricsAggregator             │
//! │  (after commit: publish to subscribers, count blocks)   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use verdict_chain::{Ledger, LedgerConfig, SubscriptionFilter};
//! use verdict_core::LocalKeyProvider;
//!
//! # async fn run() -> verdict_core::Result<()> {
//! let ledger = Ledger::open(
//!     LedgerConfig::default().with_snapshot_path("./data/chain.json"),
//!     Arc::new(LocalKeyProvider::generate()),
//! )
//! .await?;
//!
//! let mut approvals = ledger.subscribe(SubscriptionFilter::block_type("approval_granted"));
//! ledger
//!     .append_block("approval_granted", serde_json::json!({ "id": "x1" }))
//!     .await?;
//!
//! let block = approvals.recv().await;
//! assert!(ledger.verify_all().valid);
//! # Ok(())
//! # }
//! ```

mod broadcast;
mod config;
mod factory;
mod ledger;
mod metrics;
mod store;

pub use broadcast::{
    BlockSink, Broadcaster, ChannelSink, ForwardSink, Subscription, SubscriptionFilter,
};
pub use config::LedgerConfig;
pub use factory::BlockFactory;
pub use ledger::Ledger;
pub use metrics::MetricsAggregator;
pub use store::{ChainStore, ChainWriter};
