//! Record a handful of approval decisions and audit the result.
//!
//! ```text
//! RUST_LOG=verdict_chain=debug cargo run -p verdict-chain --example record_decisions [snapshot.json]
//! ```

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use verdict_chain::{ChannelSink, Ledger, LedgerConfig, SubscriptionFilter};
use verdict_core::LocalKeyProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = LedgerConfig::default().with_system_id("approvals-demo");
    if let Some(path) = std::env::args().nth(1) {
        config = config.with_snapshot_path(path);
    }

    let ledger = Ledger::open(config, Arc::new(LocalKeyProvider::generate())).await?;

    let mut denials = ledger.subscribe(SubscriptionFilter::block_type("approval_denied"));
    let (tx, mut audit_rx) = mpsc::channel(64);
    let _audit = ledger.attach(ChannelSink::new("audit", tx), SubscriptionFilter::All);

    let decisions = [
        ("approval_requested", json!({ "id": "req-1", "amount": 1200 })),
        ("approval_granted", json!({ "id": "req-1", "by": "alice" })),
        ("approval_requested", json!({ "id": "req-2", "amount": 98000 })),
        ("approval_denied", json!({ "id": "req-2", "by": "bob", "reason": "over limit" })),
    ];
    let expected = decisions.len();
    for (block_type, payload) in decisions {
        let block = ledger.append_block(block_type, payload).await?;
        println!("#{} {} {}", block.index, block.block_type, block.hash);
    }

    if let Some(block) = denials.recv().await {
        println!("denial recorded at index {}: {}", block.index, block.payload);
    }
    let mut audited = 0;
    while audited < expected {
        if audit_rx.recv().await.is_none() {
            break;
        }
        audited += 1;
    }
    println!("audit sink received {} blocks", audited);

    let report = ledger.verify_all();
    println!("{}", report);
    report.into_result()?;

    let metrics = ledger.metrics_snapshot();
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    Ok(())
}
