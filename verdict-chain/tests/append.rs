//! Append path under contention and failure: concurrent writers, failing or
//! misbehaving key providers, failing storage and cancelled callers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use verdict_chain::{Ledger, LedgerConfig, SubscriptionFilter};
use verdict_core::{
    Error, ErrorCode, Hash, KeyProvider, LocalKeyProvider, PublicKey, Result, SecretKey, Sig,
};
use verdict_storage::MemoryStore;

/// Signs with a local key, but can be switched offline or made to sign with
/// the wrong key, and can be slowed down.
struct FlakyProvider {
    key: SecretKey,
    impostor: SecretKey,
    offline: AtomicBool,
    wrong_key: AtomicBool,
    delay: Duration,
}

impl FlakyProvider {
    fn new(delay: Duration) -> Self {
        Self {
            key: SecretKey::generate(),
            impostor: SecretKey::generate(),
            offline: AtomicBool::new(false),
            wrong_key: AtomicBool::new(false),
            delay,
        }
    }
}

#[async_trait]
impl KeyProvider for FlakyProvider {
    fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    async fn sign(&self, digest: &Hash) -> Result<Sig> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::signing("signer offline"));
        }
        if self.wrong_key.load(Ordering::SeqCst) {
            return Ok(self.impostor.sign_hash(digest));
        }
        Ok(self.key.sign_hash(digest))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_appends_form_one_chain() {
    const WRITERS: usize = 64;

    let ledger = Ledger::open(
        LedgerConfig::default(),
        Arc::new(LocalKeyProvider::generate()),
    )
    .await
    .unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.append_block("decision", json!({ "writer": i })).await })
        })
        .collect();

    let mut indices = HashSet::new();
    let mut parents = HashSet::new();
    for handle in handles {
        let block = handle.await.unwrap().unwrap();
        assert!(indices.insert(block.index));
        assert!(parents.insert(block.previous_hash));
    }

    assert_eq!(ledger.len(), WRITERS + 1);
    assert_eq!(indices, (1..=WRITERS as u64).collect::<HashSet<_>>());

    let report = ledger.verify_all();
    assert!(report.valid, "{}", report);
    assert_eq!(report.checked, WRITERS + 1);
    assert_eq!(ledger.metrics_snapshot().total_blocks, WRITERS as u64 + 1);
}

#[tokio::test]
async fn signing_failure_leaves_chain_unchanged() {
    let provider = Arc::new(FlakyProvider::new(Duration::ZERO));
    let ledger = Ledger::open(LedgerConfig::default(), provider.clone())
        .await
        .unwrap();
    let mut sub = ledger.subscribe(SubscriptionFilter::All);
    let tail = ledger.tail();

    provider.offline.store(true, Ordering::SeqCst);
    let err = ledger.append_block("decision", json!({})).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SigningUnavailable);
    assert_eq!(ledger.tail(), tail);
    assert_eq!(ledger.len(), 1);
    assert!(sub.try_recv().is_none());

    provider.offline.store(false, Ordering::SeqCst);
    let block = ledger.append_block("decision", json!({})).await.unwrap();
    assert_eq!(block.index, 1, "no index gap after a failed append");
    assert!(block.previous_hash.points_to(&tail));
}

#[tokio::test]
async fn misbehaving_provider_is_refused() {
    let provider = Arc::new(FlakyProvider::new(Duration::ZERO));
    let ledger = Ledger::open(LedgerConfig::default(), provider.clone())
        .await
        .unwrap();

    provider.wrong_key.store(true, Ordering::SeqCst);
    let err = ledger.append_block("decision", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Signing { .. }));
    assert_eq!(ledger.len(), 1);
    assert!(ledger.verify_all().valid);
}

#[tokio::test]
async fn persistence_failure_is_not_acknowledged() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::open_with_store(
        LedgerConfig::default(),
        Arc::new(LocalKeyProvider::generate()),
        store.clone(),
    )
    .await
    .unwrap();
    ledger.append_block("decision", json!({ "n": 1 })).await.unwrap();
    let durable = store.bytes().unwrap();
    let mut sub = ledger.subscribe(SubscriptionFilter::All);

    store.fail_writes(true);
    let err = ledger.append_block("decision", json!({ "n": 2 })).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::StorageWrite);
    assert!(err.is_retryable());

    assert_eq!(ledger.len(), 2);
    assert_eq!(store.bytes().unwrap(), durable);
    assert_eq!(ledger.metrics_snapshot().total_blocks, 2);
    assert!(sub.try_recv().is_none());

    store.fail_writes(false);
    let block = ledger.append_block("decision", json!({ "n": 2 })).await.unwrap();
    assert_eq!(block.index, 2);
    assert_eq!(sub.recv().await.unwrap().index, 2);
}

#[tokio::test]
async fn every_acknowledged_block_is_durable() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::open_with_store(
        LedgerConfig::default(),
        Arc::new(LocalKeyProvider::generate()),
        store.clone(),
    )
    .await
    .unwrap();

    for i in 0..5 {
        let block = ledger.append_block("decision", json!({ "i": i })).await.unwrap();
        let durable = verdict_storage::ChainSnapshot::from_bytes(&store.bytes().unwrap()).unwrap();
        assert_eq!(durable.tail(), &block);
        assert_eq!(durable.metrics.last_index, Some(block.index));
    }
    // Genesis plus one write per append.
    assert_eq!(store.write_count(), 6);
}

#[tokio::test]
async fn cancelled_caller_does_not_interrupt_append() {
    let provider = Arc::new(FlakyProvider::new(Duration::from_millis(100)));
    let ledger = Ledger::open(LedgerConfig::default(), provider)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);

    let attempt = tokio::time::timeout(
        Duration::from_millis(10),
        ledger.append_block("decision", json!({ "cancelled": true })),
    )
    .await;
    assert!(attempt.is_err(), "caller gave up before signing finished");

    // The append runs to completion on its own task.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.tail().payload, json!({ "cancelled": true }));
    assert!(ledger.verify_all().valid);
}
