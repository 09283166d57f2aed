//! Credential secrets and hashing.
//!
//! A [`RawSecret`] only exists between the caller and the [`SecretHasher`]:
//! hashing consumes it, and only the resulting [`SecretHash`] is stored.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::error::PortResult;

/// Raw credential secret (app password or access token).
///
/// Not `Clone`; redacted in `Debug` output.
pub struct RawSecret(SecretString);

impl RawSecret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::from(secret.into()))
    }

    /// Returns `true` if the secret is empty or only whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }

    /// Length of the secret in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.0.expose_secret().chars().count()
    }

    /// Exposes the secret bytes to a hasher, consuming the secret.
    pub fn consume<T>(self, f: impl FnOnce(&[u8]) -> T) -> T {
        f(self.0.expose_secret().as_bytes())
    }
}

impl std::fmt::Debug for RawSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RawSecret([REDACTED])")
    }
}

impl From<String> for RawSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for RawSecret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque digest of a credential secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretHash(String);

impl SecretHash {
    /// Wraps an already computed digest, e.g. one loaded from storage.
    #[must_use]
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// Digest as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SecretHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a raw secret into a non-reversible digest.
///
/// Implementations must be deterministic: equal secrets yield equal digests.
pub trait SecretHasher: Send + Sync {
    /// Hashes `secret`, consuming it.
    ///
    /// # Errors
    ///
    /// Returns an error only on internal failure of the hasher.
    fn hash(&self, secret: RawSecret) -> PortResult<SecretHash>;
}

/// SHA-256 hasher producing lowercase hex digests.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl SecretHasher for Sha256Hasher {
    fn hash(&self, secret: RawSecret) -> PortResult<SecretHash> {
        let digest = secret.consume(|bytes| {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            hasher.finalize()
        });
        Ok(SecretHash(format!("{digest:x}")))
    }
}
