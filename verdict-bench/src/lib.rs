//! Verdict benchmarks with optimized global allocator.
//!
//! All benchmarks in this crate run on mimalloc, set globally at startup,
//! and share the chain fixtures below.

use mimalloc::MiMalloc;
use serde_json::{json, Value};
use verdict_core::{Block, BlockBuilder, SecretKey};

/// Global allocator using mimalloc.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Re-export mimalloc for direct access if needed.
pub use mimalloc;

/// A decision payload of roughly realistic size.
pub fn decision_payload(n: u64) -> Value {
    json!({
        "requestId": format!("req-{:08}", n),
        "decision": if n % 3 == 0 { "denied" } else { "granted" },
        "reviewer": { "id": n % 17, "role": "approver" },
        "amount": n * 125,
        "reasons": ["policy-check", "limit-check"],
    })
}

/// Build a signed chain of `len` blocks, genesis included.
pub fn build_chain(key: &SecretKey, len: usize) -> Vec<Block> {
    let mut chain = Vec::with_capacity(len.max(1));
    chain.push(
        BlockBuilder::genesis("bench", &key.public_key())
            .seal(key)
            .expect("genesis builds"),
    );
    for n in 1..len as u64 {
        let block = BlockBuilder::new("approval_decided")
            .parent(&chain[chain.len() - 1])
            .payload(decision_payload(n))
            .seal(key)
            .expect("block builds");
        chain.push(block);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::verify_chain_segment;

    #[test]
    fn test_fixture_chain_verifies() {
        let key = SecretKey::generate();
        let chain = build_chain(&key, 25);

        assert_eq!(chain.len(), 25);
        assert!(verify_chain_segment(&chain, None, &key.public_key()).valid);
    }

    #[test]
    fn test_payload_varies() {
        assert_ne!(decision_payload(1), decision_payload(2));
        assert_eq!(decision_payload(3)["decision"], "denied");
    }

    #[test]
    fn test_allocator_serves_large_vectors() {
        let v: Vec<u64> = (0..100_000).collect();
        assert_eq!(v.iter().sum::<u64>(), 4_999_950_000);
    }
}
