//! Signing contract for block producers.
//!
//! The ledger never holds key material directly. It asks a [`KeyProvider`]
//! to sign each block digest, which lets deployments back signing with an
//! HSM or remote signer while tests use [`LocalKeyProvider`].

use async_trait::async_trait;

use crate::crypto::{Hash, PublicKey, SecretKey, Sig};
use crate::error::Result;

/// Source of block signatures.
///
/// The signed message is always the lowercase hex rendering of the digest.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Public key that verifies this provider's signatures.
    fn public_key(&self) -> PublicKey;

    /// Sign a block digest.
    async fn sign(&self, digest: &Hash) -> Result<Sig>;

    /// Verify a signature over a digest.
    fn verify(&self, digest: &Hash, signature: &Sig, public_key: &PublicKey) -> bool {
        public_key.verify_hash(digest, signature)
    }
}

/// Key provider backed by an in-process Ed25519 key.
#[derive(Debug, Clone)]
pub struct LocalKeyProvider {
    key: SecretKey,
}

impl LocalKeyProvider {
    /// Wrap an existing key.
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self::new(SecretKey::generate())
    }
}

#[async_trait]
impl KeyProvider for LocalKeyProvider {
    fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    async fn sign(&self, digest: &Hash) -> Result<Sig> {
        Ok(self.key.sign_hash(digest))
    }
}
