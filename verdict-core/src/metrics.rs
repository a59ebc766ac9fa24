//! Derived ledger counters.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the ledger's running counters.
///
/// Everything except `last_append_duration_ms` can be recomputed from the
/// chain itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Number of blocks including genesis.
    pub total_blocks: u64,
    /// Block count per type tag.
    pub blocks_by_type: BTreeMap<String, u64>,
    /// Index of the tail block.
    pub last_index: Option<u64>,
    /// Timestamp of the tail block.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_append_at: Option<DateTime<Utc>>,
    /// Wall-clock time of the most recent append, in milliseconds.
    #[serde(default)]
    pub last_append_duration_ms: Option<u64>,
}

impl MetricsSnapshot {
    /// Count for a given block type.
    pub fn count_of(&self, block_type: &str) -> u64 {
        self.blocks_by_type.get(block_type).copied().unwrap_or(0)
    }

    /// Drop the fields that cannot be rebuilt from the chain.
    pub fn reproducible(&self) -> Self {
        Self {
            last_append_duration_ms: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let mut snapshot = MetricsSnapshot {
            total_blocks: 2,
            last_index: Some(1),
            last_append_at: DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000),
            last_append_duration_ms: Some(3),
            ..Default::default()
        };
        snapshot.blocks_by_type.insert("genesis".into(), 1);
        snapshot.blocks_by_type.insert("approval_requested".into(), 1);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["totalBlocks"], 2);
        assert_eq!(value["blocksByType"]["genesis"], 1);
        assert_eq!(value["lastAppendAt"], 1_700_000_000_000i64);

        let restored: MetricsSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_count_of_and_reproducible() {
        let mut snapshot = MetricsSnapshot {
            last_append_duration_ms: Some(12),
            ..Default::default()
        };
        snapshot.blocks_by_type.insert("a".into(), 4);

        assert_eq!(snapshot.count_of("a"), 4);
        assert_eq!(snapshot.count_of("b"), 0);
        assert_eq!(snapshot.reproducible().last_append_duration_ms, None);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let restored: MetricsSnapshot =
            serde_json::from_str(r#"{"totalBlocks":1,"blocksByType":{},"lastIndex":0}"#).unwrap();
        assert_eq!(restored.last_append_at, None);
        assert_eq!(restored.last_append_duration_ms, None);
    }
}
