//! Error types for the authorization layer.
//!
//! Every failure is local and final: nothing here is worth retrying without
//! changing the inputs. [`AuthError::kind`] folds the detailed variants into
//! the coarse classes callers surface to users.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::signatures::SignatureError;
use crate::delegation::DelegationError;
use crate::ledger::LedgerError;

/// Failure reported by a collaborator while committing or undoing a staged
/// effect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct EffectError(pub String);

/// Coarse failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    OutOfOrder,
    Expired,
    BadSignature,
    CapacityExceeded,
    /// Malformed input that fits none of the above, e.g. an unknown op type.
    Invalid,
}

/// Errors raised while staging, finalizing, reverting or validating a
/// boosted submission.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Delegation(#[from] DelegationError),

    #[error("unknown operation type {0}")]
    UnknownOpType(u8),

    #[error("{account} is not delegated")]
    NotDelegated { account: Address },

    /// Finalize by someone other than the creating delegate while the
    /// delegation that authorized the operation is still in force.
    #[error("operation {op_id} of {account} cannot be finalized by {caller} yet")]
    FinalizeNotYetAllowed {
        caller: Address,
        account: Address,
        op_id: u64,
    },

    #[error("{caller} is not the delegate that created the operation")]
    NotCreationDelegate { caller: Address },

    #[error("{account} is no longer delegated to {delegate}")]
    DelegationEnded { account: Address, delegate: Address },

    #[error("finalize out of order: next is {expected}, got {got}")]
    NotNextFinalize { expected: u64, got: u64 },

    #[error("revert out of order: next is {expected}, got {got}")]
    NotNextRevert { expected: u64, got: u64 },

    #[error("no registered recognizer accepts the proof")]
    UnrecognizedProof,

    #[error("proof is an intent of {found}, not {account}")]
    ProofForOtherAccount { account: Address, found: Address },

    #[error("signature mismatch: expected {expected}, recovered {recovered:?}")]
    SignatureMismatch {
        expected: Address,
        recovered: Option<Address>,
    },

    #[error(transparent)]
    InvalidSignature(#[from] SignatureError),

    #[error("proof signed at {timestamp} is too old at {now}")]
    ProofExpired { timestamp: u64, now: u64 },

    #[error("operation created at {created_at} is too old to revert at {now}")]
    OperationExpired { created_at: u64, now: u64 },

    #[error("caller {caller} is not the intent's booster {booster}")]
    BoosterMismatch { caller: Address, booster: Address },

    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    /// The intent's timestamp lies outside
    /// `[now - opt_out_period, now + max_future_skew]`.
    #[error("intent timestamp {timestamp} outside the valid window at {now}")]
    IntentExpired { timestamp: u64, now: u64 },

    #[error("collaborator failed: {0}")]
    Effect(#[from] EffectError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Ledger(LedgerError::NotFound { .. }) => ErrorKind::NotFound,
            AuthError::Ledger(LedgerError::CapacityExceeded { .. }) => ErrorKind::CapacityExceeded,
            AuthError::Delegation(_)
            | AuthError::NotDelegated { .. }
            | AuthError::FinalizeNotYetAllowed { .. }
            | AuthError::NotCreationDelegate { .. }
            | AuthError::DelegationEnded { .. }
            | AuthError::BoosterMismatch { .. }
            | AuthError::InvalidNonce { .. } => ErrorKind::Unauthorized,
            AuthError::NotNextFinalize { .. } | AuthError::NotNextRevert { .. } => {
                ErrorKind::OutOfOrder
            }
            AuthError::ProofExpired { .. }
            | AuthError::OperationExpired { .. }
            | AuthError::IntentExpired { .. } => ErrorKind::Expired,
            AuthError::UnrecognizedProof
            | AuthError::ProofForOtherAccount { .. }
            | AuthError::SignatureMismatch { .. }
            | AuthError::InvalidSignature(_) => ErrorKind::BadSignature,
            AuthError::UnknownOpType(_) | AuthError::Effect(_) => ErrorKind::Invalid,
        }
    }
}
