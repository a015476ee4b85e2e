//! # Recoverable Signatures
//!
//! The protocol never verifies a signature against a known public key; it
//! *recovers* the signer from `(digest, r, s, v)` and compares addresses.
//!
//! Two signing paths reach the same digest:
//!
//! - **structured** — the wallet signs the typed-message digest directly;
//! - **personal-sign** — the wallet only knows how to sign "a message", so
//!   it wraps the digest in the `\x19Ethereum Signed Message:\n32` envelope
//!   first. Hardware wallets live here.
//!
//! Both paths run through [`normalize_recovery_byte`] before recovery, so
//! the malleability rules are enforced in exactly one place.

use alloy_primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::hash::personal_sign_digest;
use super::keys::{address_of, BoostKeypair, KeyError};

/// Errors during signature handling.
///
/// Intentionally coarse; callers only need to know the signature is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature bytes: expected 65 bytes")]
    InvalidLength,

    #[error("invalid recovery byte {0}")]
    InvalidRecoveryByte(u8),

    #[error("non-canonical signature: s is in the upper half of the curve order")]
    HighS,

    #[error("signer could not be recovered")]
    RecoveryFailed,
}

/// An ECDSA signature in `(r, s, v)` form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub r: B256,
    pub s: B256,
    pub v: u8,
}

impl Signature {
    /// `r || s || v`, 65 bytes.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }

    /// Parses `r || s || v`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != 65 {
            return Err(SignatureError::InvalidLength);
        }
        Ok(Self {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v: bytes[64],
        })
    }

    /// Hex form with a `0x` prefix, as wallets return it.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Parses the hex form, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|_| SignatureError::InvalidLength)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

/// Rewrites a `0`/`1` recovery byte into the `27`/`28` form.
///
/// Generic message-signing paths disagree on which form they emit. Applying
/// this twice is the same as applying it once.
pub fn repair_recovery_byte(signature: Signature) -> Signature {
    let mut repaired = signature;
    if repaired.v < 27 {
        repaired.v += 27;
    }
    repaired
}

/// Repairs the recovery byte and maps it to a curve recovery id.
/// Anything outside `{0, 1, 27, 28}` is rejected.
pub fn normalize_recovery_byte(signature: &Signature) -> Result<RecoveryId, SignatureError> {
    let repaired = repair_recovery_byte(*signature);
    match repaired.v {
        27 | 28 => RecoveryId::from_byte(repaired.v - 27)
            .ok_or(SignatureError::InvalidRecoveryByte(signature.v)),
        _ => Err(SignatureError::InvalidRecoveryByte(signature.v)),
    }
}

/// Recovers the address that produced `signature` over `digest`.
///
/// High-`s` signatures are rejected: for every valid `(r, s)` there is a
/// twin `(r, n - s)` and accepting both would make signatures malleable.
pub fn recover_signer(digest: &B256, signature: &Signature) -> Result<Address, SignatureError> {
    let recovery_id = normalize_recovery_byte(signature)?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(signature.r.as_slice());
    rs[32..].copy_from_slice(signature.s.as_slice());
    let parsed = K256Signature::from_slice(&rs).map_err(|_| SignatureError::RecoveryFailed)?;
    if parsed.normalize_s().is_some() {
        return Err(SignatureError::HighS);
    }

    let verifying_key = VerifyingKey::recover_from_prehash(digest.as_slice(), &parsed, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    Ok(address_of(&verifying_key))
}

// ---------------------------------------------------------------------------
// Signing paths
// ---------------------------------------------------------------------------

/// A way of turning a typed-message digest into the 32 bytes a wallet signs.
pub trait SigningPath {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The prehash actually signed for `digest`.
    fn prepare(&self, digest: &B256) -> B256;

    /// Signs `digest` along this path.
    fn sign(&self, keypair: &BoostKeypair, digest: &B256) -> Result<Signature, KeyError> {
        keypair.sign_digest(&self.prepare(digest))
    }

    /// Recovers the signer of `digest` along this path.
    fn recover(&self, digest: &B256, signature: &Signature) -> Result<Address, SignatureError> {
        recover_signer(&self.prepare(digest), signature)
    }
}

/// The wallet signed the typed-message digest itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredPath;

impl SigningPath for StructuredPath {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn prepare(&self, digest: &B256) -> B256 {
        *digest
    }
}

/// The wallet signed the digest as an opaque 32-byte message.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalSignPath;

impl SigningPath for PersonalSignPath {
    fn name(&self) -> &'static str {
        "personal-sign"
    }

    fn prepare(&self, digest: &B256) -> B256 {
        personal_sign_digest(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;

    fn kp() -> BoostKeypair {
        BoostKeypair::from_seed_phrase("signatures").unwrap()
    }

    #[test]
    fn test_structured_sign_and_recover() {
        let kp = kp();
        let digest = keccak256(b"boosted send");
        let sig = StructuredPath.sign(&kp, &digest).unwrap();
        assert_eq!(StructuredPath.recover(&digest, &sig).unwrap(), kp.address());
    }

    #[test]
    fn test_personal_sign_recovers_only_on_its_path() {
        let kp = kp();
        let digest = keccak256(b"boosted burn");
        let sig = PersonalSignPath.sign(&kp, &digest).unwrap();
        assert_eq!(PersonalSignPath.recover(&digest, &sig).unwrap(), kp.address());
        // The structured path recovers *some* address, just not ours.
        let other = StructuredPath.recover(&digest, &sig);
        assert_ne!(other.ok(), Some(kp.address()));
    }

    #[test]
    fn test_repair_is_idempotent() {
        let kp = kp();
        let mut sig = kp.sign_digest(&keccak256(b"x")).unwrap();
        sig.v -= 27;
        let once = repair_recovery_byte(sig);
        let twice = repair_recovery_byte(once);
        assert_eq!(once, twice);
        assert!(once.v == 27 || once.v == 28);
    }

    #[test]
    fn test_zero_one_recovery_byte_accepted() {
        let kp = kp();
        let digest = keccak256(b"legacy wallet");
        let mut sig = kp.sign_digest(&digest).unwrap();
        sig.v -= 27;
        assert_eq!(recover_signer(&digest, &sig).unwrap(), kp.address());
    }

    #[test]
    fn test_unknown_recovery_byte_rejected() {
        let kp = kp();
        let digest = keccak256(b"v");
        let mut sig = kp.sign_digest(&digest).unwrap();
        sig.v = 35;
        assert_eq!(
            recover_signer(&digest, &sig),
            Err(SignatureError::InvalidRecoveryByte(35))
        );
    }

    #[test]
    fn test_high_s_rejected() {
        let kp = kp();
        let digest = keccak256(b"malleable");
        let sig = kp.sign_digest(&digest).unwrap();

        // s' = n - s, with the recovery parity flipped: a valid twin signature.
        let parsed = {
            let mut rs = [0u8; 64];
            rs[..32].copy_from_slice(sig.r.as_slice());
            rs[32..].copy_from_slice(sig.s.as_slice());
            K256Signature::from_slice(&rs).unwrap()
        };
        let (r, s) = parsed.split_scalars();
        let twin = K256Signature::from_scalars(r, -*s).unwrap();
        let twin_bytes = twin.to_bytes();
        let malleated = Signature {
            r: B256::from_slice(&twin_bytes[..32]),
            s: B256::from_slice(&twin_bytes[32..]),
            v: if sig.v == 27 { 28 } else { 27 },
        };
        assert_eq!(recover_signer(&digest, &malleated), Err(SignatureError::HighS));
    }

    #[test]
    fn test_bytes_and_hex_roundtrip() {
        let sig = kp().sign_digest(&keccak256(b"hex")).unwrap();
        assert_eq!(Signature::from_bytes(&sig.to_bytes()).unwrap(), sig);
        assert_eq!(Signature::from_hex(&sig.to_hex()).unwrap(), sig);
        assert_eq!(
            Signature::from_bytes(&[0u8; 64]),
            Err(SignatureError::InvalidLength)
        );
    }
}
