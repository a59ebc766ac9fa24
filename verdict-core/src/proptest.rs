//! Property-based tests for core types.
//!
//! Uses proptest to verify invariants hold for arbitrary inputs.

use proptest::prelude::*;
use serde_json::{Map, Value};

use crate::block::{canonical_bytes, Block, BlockBuilder, PreviousHash};
use crate::crypto::{hash, Hash, SecretKey};
use crate::verify::{verify_block_signature, verify_block_value, verify_chain_segment};

// ============================================================================
// Arbitrary Implementations
// ============================================================================

/// Generate arbitrary 32-byte arrays.
fn arb_bytes32() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

/// Generate arbitrary JSON payloads, nested a few levels deep.
fn arb_payload() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Value::from),
        "[a-zA-Z0-9 _\\-\"\\\\]{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6).prop_map(|entries| {
                Value::Object(entries.into_iter().collect::<Map<String, Value>>())
            }),
        ]
    })
}

/// Generate a block type tag.
fn arb_block_type() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,23}"
}

/// Build a signed chain with the given payloads.
fn build_chain(key: &SecretKey, payloads: &[(String, Value)]) -> Vec<Block> {
    let mut chain = vec![BlockBuilder::genesis("prop", &key.public_key())
        .seal(key)
        .expect("genesis should build")];
    for (block_type, payload) in payloads {
        let block = BlockBuilder::new(block_type.clone())
            .parent(chain.last().expect("chain is never empty"))
            .payload(payload.clone())
            .seal(key)
            .expect("block should build");
        chain.push(block);
    }
    chain
}

// ============================================================================
// Hash Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Hash hex roundtrip: from_hex(h.to_hex()) == h
    #[test]
    fn prop_hash_hex_roundtrip(bytes in arb_bytes32()) {
        let h = Hash::from_bytes(bytes);
        let restored = Hash::from_hex(&h.to_hex()).expect("hex roundtrip should succeed");
        prop_assert_eq!(h, restored);
    }

    /// Hash determinism: hash(data) always produces same result
    #[test]
    fn prop_hash_deterministic(data in prop::collection::vec(any::<u8>(), 0..1000)) {
        prop_assert_eq!(hash(&data), hash(&data));
    }
}

// ============================================================================
// Canonical Encoding Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Canonical bytes are valid JSON holding the five fields in order.
    #[test]
    fn prop_canonical_bytes_parse_back(
        index in any::<u64>(),
        millis in 0i64..4_000_000_000_000,
        block_type in arb_block_type(),
        payload in arb_payload(),
        prev in arb_bytes32(),
    ) {
        let ts = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis).unwrap();
        let prev = PreviousHash::Block(Hash::from_bytes(prev));
        let bytes = canonical_bytes(index, &ts, &block_type, &payload, &prev);

        let parsed: Value = serde_json::from_slice(&bytes).expect("canonical bytes are JSON");
        let fields = parsed.as_array().expect("canonical form is an array");
        prop_assert_eq!(fields.len(), 5);
        prop_assert_eq!(fields[0].as_u64(), Some(index));
        prop_assert_eq!(fields[1].as_i64(), Some(millis));
        prop_assert_eq!(fields[2].as_str(), Some(block_type.as_str()));
        prop_assert_eq!(&fields[3], &payload);
        let prev_str = prev.to_string();
        prop_assert_eq!(fields[4].as_str(), Some(prev_str.as_str()));
    }

    /// Re-encoding a payload through JSON text does not change the hash.
    #[test]
    fn prop_hash_stable_across_reserialization(
        block_type in arb_block_type(),
        payload in arb_payload(),
    ) {
        let key = SecretKey::generate();
        let chain = build_chain(&key, &[(block_type, payload)]);
        let text = serde_json::to_string(&chain[1]).expect("serialize");
        let restored: Block = serde_json::from_str(&text).expect("deserialize");

        prop_assert_eq!(restored.compute_hash(), chain[1].hash);
        prop_assert!(verify_block_signature(&restored, &key.public_key()));
    }
}

// ============================================================================
// Tamper Detection Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every appended block verifies and links to its predecessor.
    #[test]
    fn prop_chain_verifies(
        payloads in prop::collection::vec((arb_block_type(), arb_payload()), 0..8),
    ) {
        let key = SecretKey::generate();
        let chain = build_chain(&key, &payloads);
        let report = verify_chain_segment(&chain, None, &key.public_key());

        prop_assert!(report.valid);
        prop_assert_eq!(report.checked, payloads.len() + 1);
        for pair in chain.windows(2) {
            prop_assert_eq!(pair[1].index, pair[0].index + 1);
            prop_assert!(pair[1].previous_hash.points_to(&pair[0]));
        }
    }

    /// Mutating any single hashed field of any block is detected at that block.
    #[test]
    fn prop_single_field_tamper_detected(
        payloads in prop::collection::vec((arb_block_type(), arb_payload()), 1..6),
        target in any::<prop::sample::Index>(),
        field in 0usize..6,
    ) {
        let key = SecretKey::generate();
        let mut chain = build_chain(&key, &payloads);
        // A first block has no predecessor to pin its position, so index
        // tampering is exercised on later blocks only.
        let i = if field == 0 {
            target.index(chain.len() - 1) + 1
        } else {
            target.index(chain.len())
        };

        let mut value = serde_json::to_value(&chain[i]).expect("block to json");
        match field {
            0 => value["index"] = Value::from(chain[i].index + 7),
            1 => value["timestamp"] = Value::from(chain[i].timestamp.timestamp_millis() + 1),
            2 => value["type"] = Value::from(format!("{}_x", chain[i].block_type)),
            3 => value["payload"] = serde_json::json!({ "tampered": true, "was": value["payload"].clone() }),
            4 => value["previousHash"] = Value::from(hash(b"elsewhere").to_hex()),
            _ => value["hash"] = Value::from(hash(b"forged").to_hex()),
        }

        prop_assert!(!verify_block_value(&value, &key.public_key()).expect("well-formed record"));

        chain[i] = serde_json::from_value(value).expect("tampered block still parses");
        let report = verify_chain_segment(&chain, None, &key.public_key());
        prop_assert!(!report.valid);
        prop_assert_eq!(report.broken_at_index, Some(i as u64));
    }
}
