//! # Authorization
//!
//! Decides who may finalize or revert a pending operation.
//!
//! A collaborator stages an effect through [`Authority::stage`], which
//! records the account's delegate at that moment. From then on:
//!
//! - **finalize** is open to the creating delegate at any time, and to
//!   anyone once the operation has outlived the opt-out period or the
//!   account has left that delegate. Finalization is strictly FIFO.
//! - **revert** is reserved to the creating delegate while the account is
//!   still delegated to it, requires a signed intent of the account that a
//!   registered [`ProofRecognizer`] understands, and is strictly LIFO.
//!
//! Only the boundary operation is actionable, so two submitters racing on
//! the same id cannot both succeed: the loser gets `NotFound`.

pub mod error;
pub mod submission;

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

pub use error::{AuthError, EffectError, ErrorKind};
pub use submission::BoostVerifier;

use crate::clock::Clock;
use crate::config::{ConfigError, ProtocolConfig};
use crate::crypto::signatures::Signature;
use crate::delegation::DelegationRegistry;
use crate::ledger::{PendingOperation, PendingOperationLedger};
use crate::typed::{decode, signing_hash, verify_digest, BoostedIntent, Eip712Domain, IntentKind};

/// Delegation registry shared by every collaborator of one deployment.
pub type SharedRegistry = Arc<RwLock<DelegationRegistry>>;

pub fn shared_registry(registry: DelegationRegistry) -> SharedRegistry {
    Arc::new(RwLock::new(registry))
}

/// The staged effects a collaborator keeps per pending operation.
pub trait PendingEffects {
    /// Makes the staged effect of `op` final.
    fn commit(&mut self, op: &PendingOperation) -> Result<(), EffectError>;

    /// Discards the staged effect of `op`, restoring the prior state.
    fn undo(&mut self, op: &PendingOperation) -> Result<(), EffectError>;
}

/// Interprets opaque revert-proof bytes as a signed intent.
pub trait ProofRecognizer: Send + Sync {
    fn name(&self) -> &str;

    /// `None` if the bytes are not an intent this recognizer knows.
    fn recognize(&self, proof: &[u8]) -> Option<RecognizedProof>;
}

/// What a recognizer extracted from a revert proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedProof {
    pub kind: IntentKind,
    pub account: Address,
    /// Digest the account signed.
    pub digest: B256,
    pub timestamp: u64,
    pub is_legacy_signature: bool,
}

impl RecognizedProof {
    pub fn from_intent(intent: &BoostedIntent, domain: &Eip712Domain) -> Self {
        Self {
            kind: intent.kind(),
            account: intent.account(),
            digest: signing_hash(intent, domain),
            timestamp: intent.timestamp(),
            is_legacy_signature: intent.is_legacy_signature(),
        }
    }
}

/// Recognizes encoded intents of the given kinds, hashed under one domain.
#[derive(Debug, Clone)]
pub struct IntentRecognizer {
    domain: Eip712Domain,
    kinds: Vec<IntentKind>,
}

impl IntentRecognizer {
    pub fn new(domain: Eip712Domain, kinds: &[IntentKind]) -> Self {
        Self {
            domain,
            kinds: kinds.to_vec(),
        }
    }

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }
}

impl ProofRecognizer for IntentRecognizer {
    fn name(&self) -> &str {
        &self.domain.name
    }

    fn recognize(&self, proof: &[u8]) -> Option<RecognizedProof> {
        let intent = match decode(proof) {
            Ok(intent) => intent,
            Err(err) => {
                debug!(recognizer = %self.domain.name, error = %err, "proof not decodable");
                return None;
            }
        };
        if !self.kinds.contains(&intent.kind()) {
            return None;
        }
        Some(RecognizedProof::from_intent(&intent, &self.domain))
    }
}

/// Per-collaborator authorization state: the collaborator's pending
/// operations plus the shared registry and clock.
pub struct Authority {
    config: ProtocolConfig,
    clock: Arc<dyn Clock>,
    registry: SharedRegistry,
    ledger: PendingOperationLedger,
    recognizers: Vec<Box<dyn ProofRecognizer>>,
}

impl Authority {
    pub fn new(
        config: ProtocolConfig,
        clock: Arc<dyn Clock>,
        registry: SharedRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry_period = registry.read().opt_out_period();
        if registry_period != config.opt_out_period {
            return Err(ConfigError::RegistryMismatch {
                config: config.opt_out_period,
                registry: registry_period,
            });
        }
        let ledger = PendingOperationLedger::from_config(&config);
        Ok(Self {
            config,
            clock,
            registry,
            ledger,
            recognizers: Vec::new(),
        })
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &PendingOperationLedger {
        &self.ledger
    }

    pub fn register_recognizer(&mut self, recognizer: Box<dyn ProofRecognizer>) {
        info!(recognizer = recognizer.name(), "proof recognizer registered");
        self.recognizers.push(recognizer);
    }

    /// The registry's opt-out period. [`Authority::new`] makes sure the
    /// config agrees with it.
    pub fn opt_out_period(&self) -> u64 {
        self.registry.read().opt_out_period()
    }

    /// Stages an operation of `op_type` for a delegated account.
    pub fn stage(&mut self, account: Address, op_type: u8) -> Result<u64, AuthError> {
        ensure_op_type(op_type)?;
        let now = self.now();
        let delegate = self
            .registry
            .read()
            .effective_delegate(account, now)
            .ok_or(AuthError::NotDelegated { account })?;
        Ok(self.ledger.create(account, op_type, delegate, now)?)
    }

    /// Checks that `caller` may finalize `op_id` right now.
    pub fn can_finalize(
        &self,
        caller: Address,
        account: Address,
        op_id: u64,
    ) -> Result<PendingOperation, AuthError> {
        let result = self.check_finalize(caller, account, op_id);
        if let Err(err) = &result {
            debug!(caller = %caller, account = %account, op_id, error = %err, "finalize rejected");
        }
        result
    }

    fn check_finalize(
        &self,
        caller: Address,
        account: Address,
        op_id: u64,
    ) -> Result<PendingOperation, AuthError> {
        let op = self.ledger.safe_get(account, op_id)?;
        ensure_op_type(op.op_type)?;

        let now = self.now();
        let delegate = op.delegate_at_creation;
        let registry = self.registry.read();
        let expired = now > op.created_at.saturating_add(registry.opt_out_period());
        if caller != delegate && !expired && registry.is_delegated_to(account, delegate, now) {
            return Err(AuthError::FinalizeNotYetAllowed {
                caller,
                account,
                op_id,
            });
        }

        let next = self.ledger.op_counter(account).next_finalize;
        if op_id != next {
            return Err(AuthError::NotNextFinalize {
                expected: next,
                got: op_id,
            });
        }
        Ok(op)
    }

    /// Finalizes `op_id`: guard, commit the staged effect, then drop the
    /// ledger entry.
    pub fn finalize(
        &mut self,
        caller: Address,
        account: Address,
        op_id: u64,
        effects: &mut dyn PendingEffects,
    ) -> Result<PendingOperation, AuthError> {
        let op = self.can_finalize(caller, account, op_id)?;
        effects.commit(&op)?;
        self.ledger.delete(account, op_id)?;
        info!(caller = %caller, account = %account, op_id, op_type = op.op_type, "operation finalized");
        Ok(op)
    }

    /// Checks that `caller` may revert `op_id` with the given proof.
    pub fn can_revert(
        &self,
        caller: Address,
        account: Address,
        op_id: u64,
        proof: &[u8],
        signature: &Signature,
    ) -> Result<PendingOperation, AuthError> {
        let result = self.check_revert(caller, account, op_id, proof, signature);
        if let Err(err) = &result {
            debug!(caller = %caller, account = %account, op_id, error = %err, "revert rejected");
        }
        result
    }

    fn check_revert(
        &self,
        caller: Address,
        account: Address,
        op_id: u64,
        proof: &[u8],
        signature: &Signature,
    ) -> Result<PendingOperation, AuthError> {
        let op = self.ledger.safe_get(account, op_id)?;
        ensure_op_type(op.op_type)?;

        let now = self.now();
        let delegate = op.delegate_at_creation;
        if caller != delegate {
            return Err(AuthError::NotCreationDelegate { caller });
        }
        if !self.registry.read().is_delegated_to(account, delegate, now) {
            return Err(AuthError::DelegationEnded { account, delegate });
        }

        let next = self.ledger.op_counter(account).next_revert;
        if op_id != next {
            return Err(AuthError::NotNextRevert {
                expected: next,
                got: op_id,
            });
        }

        let recognized = self.match_proof(account, proof, signature)?;

        let window = self.config.revert_proof_window;
        if recognized.timestamp.saturating_add(window) < now {
            return Err(AuthError::ProofExpired {
                timestamp: recognized.timestamp,
                now,
            });
        }
        if op.created_at.saturating_add(window) < now {
            return Err(AuthError::OperationExpired {
                created_at: op.created_at,
                now,
            });
        }
        Ok(op)
    }

    /// Finds a recognizer under which `proof` is an intent of `account`
    /// signed by `account`. Collaborators may share intent kinds, so every
    /// recognizer gets its turn before the proof is rejected. The error
    /// returned is the closest miss: a bad signature beats an intent of
    /// another account, which beats an unknown proof.
    fn match_proof(
        &self,
        account: Address,
        proof: &[u8],
        signature: &Signature,
    ) -> Result<RecognizedProof, AuthError> {
        let mut closest = AuthError::UnrecognizedProof;
        for recognizer in &self.recognizers {
            let Some(recognized) = recognizer.recognize(proof) else {
                continue;
            };
            if recognized.account != account {
                if matches!(closest, AuthError::UnrecognizedProof) {
                    closest = AuthError::ProofForOtherAccount {
                        account,
                        found: recognized.account,
                    };
                }
                continue;
            }

            let miss = match verify_digest(
                &recognized.digest,
                account,
                recognized.is_legacy_signature,
                signature,
            ) {
                Ok(signer) if signer == account => {
                    debug!(recognizer = recognizer.name(), account = %account, "revert proof matched");
                    return Ok(recognized);
                }
                Ok(signer) => AuthError::SignatureMismatch {
                    expected: account,
                    recovered: Some(signer),
                },
                Err(err) => AuthError::from(err),
            };
            if !matches!(
                closest,
                AuthError::SignatureMismatch { .. } | AuthError::InvalidSignature(_)
            ) {
                closest = miss;
            }
        }
        Err(closest)
    }

    /// Reverts `op_id`: guard, undo the staged effect, then drop the ledger
    /// entry.
    pub fn revert(
        &mut self,
        caller: Address,
        account: Address,
        op_id: u64,
        proof: &[u8],
        signature: &Signature,
        effects: &mut dyn PendingEffects,
    ) -> Result<PendingOperation, AuthError> {
        let op = self.can_revert(caller, account, op_id, proof, signature)?;
        effects.undo(&op)?;
        self.ledger.delete(account, op_id)?;
        info!(caller = %caller, account = %account, op_id, op_type = op.op_type, "operation reverted");
        Ok(op)
    }
}

fn ensure_op_type(op_type: u8) -> Result<IntentKind, AuthError> {
    IntentKind::from_tag(op_type).ok_or_else(|| {
        warn!(op_type, "unknown operation type");
        AuthError::UnknownOpType(op_type)
    })
}
