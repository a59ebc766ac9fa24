//! Error types for Verdict.
//!
//! Provides structured errors with:
//! - Unique error codes for API responses
//! - Source error chaining
//! - Client vs server error categorization

use std::io;
use thiserror::Error;

/// Result type for Verdict operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes for API responses.
///
/// Codes are structured as:
/// - 1xxx: Validation errors (client)
/// - 2xxx: Not found errors (client)
/// - 3xxx: Conflict errors (client)
/// - 5xxx: Storage errors (server)
/// - 6xxx: Internal errors (server)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Validation errors (1xxx)
    InvalidHash = 1001,
    InvalidKey = 1002,
    InvalidSignature = 1003,
    InvalidBlock = 1005,
    InvalidFormat = 1008,
    ChainInvalid = 1009,

    // Not found errors (2xxx)
    BlockNotFound = 2002,

    // Conflict errors (3xxx)
    ChainFork = 3003,

    // Storage errors (5xxx)
    StorageRead = 5001,
    StorageWrite = 5002,
    StorageCorruption = 5003,

    // Internal errors (6xxx)
    Serialization = 6001,
    Internal = 6003,
    SigningUnavailable = 6004,
}

impl ErrorCode {
    /// Get the numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Check if this is a client error (4xx equivalent).
    pub fn is_client_error(self) -> bool {
        (1000..5000).contains(&self.code())
    }

    /// Check if this is a server error (5xx equivalent).
    pub fn is_server_error(self) -> bool {
        self.code() >= 5000
    }

    /// Check if this error is retryable.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::StorageRead | ErrorCode::StorageWrite | ErrorCode::SigningUnavailable
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Errors that can occur in Verdict.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Validation Errors (client errors)
    // ========================================================================
    /// Invalid hash format or value.
    #[error("[{code}] invalid hash: {message}")]
    InvalidHash {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid cryptographic key.
    #[error("[{code}] invalid key: {message}")]
    InvalidKey { code: ErrorCode, message: String },

    /// Signature verification failed.
    #[error("[{code}] signature verification failed")]
    InvalidSignature { code: ErrorCode },

    /// Block construction or validation failed.
    #[error("[{code}] invalid block: {message}")]
    InvalidBlock { code: ErrorCode, message: String },

    /// Structurally invalid input (missing or ill-typed fields).
    #[error("[{code}] invalid format: {message}")]
    InvalidFormat { code: ErrorCode, message: String },

    /// A verified chain segment is broken.
    #[error("[{code}] chain invalid at index {index}: {reason}")]
    ChainInvalid {
        code: ErrorCode,
        index: u64,
        reason: String,
    },

    // ========================================================================
    // Not Found Errors (client errors)
    // ========================================================================
    /// Item not found.
    #[error("[{code}] not found: {message}")]
    NotFound { code: ErrorCode, message: String },

    // ========================================================================
    // Conflict Errors (client errors)
    // ========================================================================
    /// A commit would attach a second block to the same predecessor.
    #[error("[{code}] chain fork: {message}")]
    Fork { code: ErrorCode, message: String },

    // ========================================================================
    // Storage Errors (server errors)
    // ========================================================================
    /// Storage operation failed.
    #[error("[{code}] storage error: {message}")]
    Storage {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ========================================================================
    // Serialization Errors (server errors)
    // ========================================================================
    /// Serialization/deserialization failed.
    #[error("[{code}] serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ========================================================================
    // Internal Errors (server errors)
    // ========================================================================
    /// The key provider could not produce a signature.
    #[error("[{code}] signing failed: {message}")]
    Signing { code: ErrorCode, message: String },

    /// Internal error.
    #[error("[{code}] internal error: {message}")]
    Internal { code: ErrorCode, message: String },
}

impl Error {
    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidHash { code, .. } => *code,
            Error::InvalidKey { code, .. } => *code,
            Error::InvalidSignature { code } => *code,
            Error::InvalidBlock { code, .. } => *code,
            Error::InvalidFormat { code, .. } => *code,
            Error::ChainInvalid { code, .. } => *code,
            Error::NotFound { code, .. } => *code,
            Error::Fork { code, .. } => *code,
            Error::Storage { code, .. } => *code,
            Error::Serialization { code, .. } => *code,
            Error::Signing { code, .. } => *code,
            Error::Internal { code, .. } => *code,
        }
    }

    /// Check if this is a client error.
    pub fn is_client_error(&self) -> bool {
        self.code().is_client_error()
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        self.code().is_server_error()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Error {
    /// Create an InvalidHash error.
    pub fn invalid_hash(message: impl Into<String>) -> Self {
        Error::InvalidHash {
            code: ErrorCode::InvalidHash,
            message: message.into(),
            source: None,
        }
    }

    /// Create an InvalidKey error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Error::InvalidKey {
            code: ErrorCode::InvalidKey,
            message: message.into(),
        }
    }

    /// Create an InvalidSignature error.
    pub fn invalid_signature() -> Self {
        Error::InvalidSignature {
            code: ErrorCode::InvalidSignature,
        }
    }

    /// Create an InvalidBlock error.
    pub fn invalid_block(message: impl Into<String>) -> Self {
        Error::InvalidBlock {
            code: ErrorCode::InvalidBlock,
            message: message.into(),
        }
    }

    /// Create an InvalidFormat error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Error::InvalidFormat {
            code: ErrorCode::InvalidFormat,
            message: message.into(),
        }
    }

    /// Create a ChainInvalid error.
    pub fn chain_invalid(index: u64, reason: impl Into<String>) -> Self {
        Error::ChainInvalid {
            code: ErrorCode::ChainInvalid,
            index,
            reason: reason.into(),
        }
    }

    /// Create a NotFound error for blocks.
    pub fn block_not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            code: ErrorCode::BlockNotFound,
            message: message.into(),
        }
    }

    /// Create a Fork error.
    pub fn fork(message: impl Into<String>) -> Self {
        Error::Fork {
            code: ErrorCode::ChainFork,
            message: message.into(),
        }
    }

    /// Create a Storage read error.
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            code: ErrorCode::StorageRead,
            message: message.into(),
            source: None,
        }
    }

    /// Create a Storage write error.
    pub fn storage_write(message: impl Into<String>) -> Self {
        Error::Storage {
            code: ErrorCode::StorageWrite,
            message: message.into(),
            source: None,
        }
    }

    /// Create a Storage corruption error.
    pub fn storage_corruption(message: impl Into<String>) -> Self {
        Error::Storage {
            code: ErrorCode::StorageCorruption,
            message: message.into(),
            source: None,
        }
    }

    /// Create a Signing error.
    pub fn signing(message: impl Into<String>) -> Self {
        Error::Signing {
            code: ErrorCode::SigningUnavailable,
            message: message.into(),
        }
    }

    /// Create an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            code: ErrorCode::Internal,
            message: message.into(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization {
            code: ErrorCode::Serialization,
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Storage {
            code: ErrorCode::StorageRead,
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidHash {
            code: ErrorCode::InvalidHash,
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::InvalidHash.code(), 1001);
        assert_eq!(ErrorCode::BlockNotFound.code(), 2002);
        assert_eq!(ErrorCode::StorageRead.code(), 5001);
    }

    #[test]
    fn test_error_categorization() {
        assert!(ErrorCode::ChainInvalid.is_client_error());
        assert!(!ErrorCode::ChainInvalid.is_server_error());

        assert!(ErrorCode::StorageWrite.is_server_error());
        assert!(!ErrorCode::StorageWrite.is_client_error());
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::StorageWrite.is_retryable());
        assert!(ErrorCode::SigningUnavailable.is_retryable());
        assert!(!ErrorCode::ChainFork.is_retryable());
    }

    #[test]
    fn test_chain_invalid_display() {
        let e = Error::chain_invalid(7, "previous hash mismatch");
        assert_eq!(
            e.to_string(),
            "[E1009] chain invalid at index 7: previous hash mismatch"
        );
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::InvalidHash.to_string(), "E1001");
        assert_eq!(ErrorCode::Internal.to_string(), "E6003");
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<u64>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.code(), ErrorCode::Serialization);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_error_constructors() {
        let e = Error::invalid_block("empty type");
        assert_eq!(e.code(), ErrorCode::InvalidBlock);
        assert!(e.is_client_error());

        let e = Error::storage_write("disk full");
        assert_eq!(e.code(), ErrorCode::StorageWrite);
        assert!(e.is_server_error());

        let e = Error::signing("hsm offline");
        assert_eq!(e.code(), ErrorCode::SigningUnavailable);
        assert!(e.is_retryable());
    }
}
