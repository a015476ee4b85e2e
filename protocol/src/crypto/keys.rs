//! # Key Management
//!
//! secp256k1 keypairs for accounts that sign boosted intents.
//!
//! Key custody is not the protocol's business: accounts sign intents with
//! whatever wallet they like and the protocol only ever *recovers* signers.
//! `BoostKeypair` exists for collaborators, tooling and tests that need to
//! produce signatures themselves.
//!
//! Key bytes are never logged. Keep it that way.

use alloy_primitives::{Address, B256};
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

use super::hash::keccak256;
use super::signatures::Signature;

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* a key was rejected.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid hex encoding for secret key")]
    InvalidHex,

    #[error("signing failed")]
    SigningFailed,
}

/// An account keypair over secp256k1.
///
/// Intentionally not `Serialize`: exporting a secret key should be a
/// deliberate call to [`to_bytes`](Self::to_bytes), not a side effect of
/// putting a keypair into a JSON response.
#[derive(Clone)]
pub struct BoostKeypair {
    signing_key: SigningKey,
}

impl BoostKeypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Loads a keypair from a 32-byte secret scalar.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, KeyError> {
        let signing_key = SigningKey::from_slice(secret).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Loads a keypair from a hex-encoded secret, with or without `0x`.
    pub fn from_hex(secret_hex: &str) -> Result<Self, KeyError> {
        let trimmed = secret_hex.strip_prefix("0x").unwrap_or(secret_hex);
        let bytes = hex::decode(trimmed).map_err(|_| KeyError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    /// Deterministic keypair whose secret is `keccak256(seed)`.
    ///
    /// Handy for fixtures: `from_seed_phrase("0")` always yields the same
    /// account.
    pub fn from_seed_phrase(seed: &str) -> Result<Self, KeyError> {
        Self::from_bytes(keccak256(seed.as_bytes()).as_slice())
    }

    /// The 32-byte secret scalar.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    /// The account address controlled by this key.
    pub fn address(&self) -> Address {
        address_of(self.signing_key.verifying_key())
    }

    /// Signs a 32-byte prehash, producing a low-`s` signature with
    /// `v ∈ {27, 28}`.
    pub fn sign_digest(&self, digest: &B256) -> Result<Signature, KeyError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|_| KeyError::SigningFailed)?;
        let bytes = signature.to_bytes();
        Ok(Signature {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..]),
            v: 27 + recovery_id.to_byte(),
        })
    }
}

impl fmt::Debug for BoostKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoostKeypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Derives the account address of a public key: the last 20 bytes of the
/// Keccak-256 hash of the uncompressed point, without its `0x04` tag.
pub fn address_of(verifying_key: &VerifyingKey) -> Address {
    let point = verifying_key.as_affine().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
