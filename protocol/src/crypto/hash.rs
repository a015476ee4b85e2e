//! # Hashing Utilities
//!
//! Keccak-256 is the only hash the protocol needs: typed-message digests,
//! type hashes, address derivation and the personal-sign envelope all use it.
//! Note that this is the original Keccak padding, not NIST SHA3-256; the two
//! produce different digests for the same input.

use alloy_primitives::B256;
use sha3::{Digest, Keccak256};

use crate::config::PERSONAL_SIGN_PREFIX;

/// Keccak-256 of `data`.
///
/// # Example
///
/// ```
/// use boost_protocol::crypto::keccak256;
///
/// let hash = keccak256(b"");
/// assert_eq!(
///     hex::encode(hash),
///     "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
/// );
/// ```
pub fn keccak256(data: &[u8]) -> B256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    B256::from_slice(hasher.finalize().as_slice())
}

/// Keccak-256 over the concatenation of `parts`, without allocating the
/// concatenated buffer.
pub fn keccak256_concat(parts: &[&[u8]]) -> B256 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    B256::from_slice(hasher.finalize().as_slice())
}

/// Wraps a 32-byte digest the way generic message-signing wallets do before
/// signing it: `keccak256("\x19Ethereum Signed Message:\n32" || digest)`.
pub fn personal_sign_digest(digest: &B256) -> B256 {
    keccak256_concat(&[PERSONAL_SIGN_PREFIX, digest.as_slice()])
}
