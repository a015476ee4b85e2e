//! # Cryptographic Primitives
//!
//! Everything signature-related in the protocol flows through here:
//!
//! - **Keccak-256** for every hash (type hashes, digests, addresses).
//! - **secp256k1** ECDSA with public-key recovery for signatures.
//!
//! Both are thin wrappers around audited crates (`sha3`, `k256`). Nothing in
//! this module knows what an intent or a pending operation is.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{keccak256, keccak256_concat, personal_sign_digest};
pub use keys::{address_of, BoostKeypair, KeyError};
pub use signatures::{
    recover_signer, repair_recovery_byte, PersonalSignPath, Signature, SignatureError,
    SigningPath, StructuredPath,
};
