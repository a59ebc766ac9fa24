//! Ledger configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use verdict_core::{Error, Result};

/// Ledger configuration.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides:
///
/// ```toml
/// system_id = "loan-approvals"
/// snapshot_path = "/var/lib/verdict/chain.json"
/// broadcast_capacity = 4096
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Identity recorded in the genesis block.
    pub system_id: String,
    /// Snapshot file. `None` keeps the chain in memory only.
    pub snapshot_path: Option<PathBuf>,
    /// Blocks buffered per subscriber before it starts lagging.
    pub broadcast_capacity: usize,
    /// Re-verify every block when opening an existing snapshot.
    pub verify_on_open: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            system_id: "verdict".into(),
            snapshot_path: None,
            broadcast_capacity: 1024,
            verify_on_open: true,
        }
    }
}

impl LedgerConfig {
    /// Parse from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| Error::invalid_format(format!("invalid ledger config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Check that values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.system_id.trim().is_empty() {
            return Err(Error::invalid_format("system_id must not be empty"));
        }
        if self.broadcast_capacity == 0 {
            return Err(Error::invalid_format("broadcast_capacity must be at least 1"));
        }
        Ok(())
    }

    /// Set the system identity.
    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = system_id.into();
        self
    }

    /// Persist to the given file.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Set the per-subscriber buffer.
    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Enable or disable verification on open.
    pub fn with_verify_on_open(mut self, verify: bool) -> Self {
        self.verify_on_open = verify;
        self
    }
}
