//! # Hodl Locker
//!
//! Time locks over tokens deposited with the locker. The lifecycle of one
//! lock is:
//!
//! 1. **Hodl** — the creator locks part of its deposit for a number of days,
//!    or forever when the duration is 0.
//! 2. **Withdraw** — an infinite lock checkpoints its yield; the lock stays.
//! 3. **Release** — once a finite lock has expired, the locked amount is paid
//!    back to its beneficiary's deposit and the lock is deleted.
//!
//! For a delegated creator each step is staged as a pending operation. A
//! lock with a staged step is *occupied*: no other step may be queued on it
//! until the pending one is finalized or reverted. Yield accrual itself is
//! not modelled; the locker only records when it was last withdrawn.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use boost_protocol::authority::{
    AuthError, Authority, BoostVerifier, EffectError, IntentRecognizer, PendingEffects,
    ProofRecognizer, SharedRegistry,
};
use boost_protocol::clock::Clock;
use boost_protocol::config::{ConfigError, ProtocolConfig};
use boost_protocol::crypto::Signature;
use boost_protocol::ledger::PendingOperation;
use boost_protocol::typed::{BoostedIntent, Eip712Domain, IntentBody, IntentKind};

use crate::Execution;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Largest id that fits the 24-bit `hodlId` of a signed intent.
pub const MAX_HODL_ID: u32 = (1 << 24) - 1;

const HODL_KINDS: [IntentKind; 3] = [IntentKind::Hodl, IntentKind::Release, IntentKind::Withdrawal];

/// Errors that can occur during locker operations.
#[derive(Debug, Error)]
pub enum HodlError {
    #[error("insufficient deposit: {account} has {available}, needs {amount}")]
    InsufficientDeposit {
        account: Address,
        available: U256,
        amount: U256,
    },

    #[error("amount must be > 0")]
    ZeroAmount,

    #[error("hodl id {0} does not fit in 24 bits")]
    IdOutOfRange(u32),

    #[error("{creator} already has hodl {id}")]
    AlreadyExists { creator: Address, id: u32 },

    #[error("{creator} has no hodl {id}")]
    NotFound { creator: Address, id: u32 },

    /// Another step on the lock is still pending.
    #[error("hodl {id} of {creator} is occupied by a pending operation")]
    Occupied { creator: Address, id: u32 },

    #[error("hodl {id} of {creator} is locked until {unlock_at}")]
    NotExpired {
        creator: Address,
        id: u32,
        unlock_at: u64,
    },

    #[error("hodl {id} of {creator} is infinite and cannot be released")]
    Infinite { creator: Address, id: u32 },

    #[error("hodl {id} of {creator} is finite; only infinite locks withdraw")]
    Finite { creator: Address, id: u32 },

    #[error("{0:?} intents are not executed by the locker")]
    WrongIntent(IntentKind),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One time lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub creator: Address,
    pub hodl_id: u32,
    pub amount_prps: U256,
    /// Days; 0 locks forever.
    pub duration_days: u16,
    pub dubi_beneficiary: Address,
    pub prps_beneficiary: Address,
    /// `None` while the lock itself is still pending.
    pub locked_at: Option<u64>,
    pub last_withdrawal: Option<u64>,
    pub occupied: bool,
}

impl Lock {
    pub fn is_infinite(&self) -> bool {
        self.duration_days == 0
    }

    /// When a finite lock may be released.
    pub fn unlock_at(&self) -> Option<u64> {
        if self.is_infinite() {
            return None;
        }
        self.locked_at
            .map(|at| at + u64::from(self.duration_days) * SECONDS_PER_DAY)
    }
}

struct LockerState {
    clock: Arc<dyn Clock>,
    deposits: HashMap<Address, U256>,
    locks: HashMap<(Address, u32), Lock>,
    staged: HashMap<(Address, u64), (IntentKind, u32)>,
}

impl LockerState {
    fn deposit_of(&self, account: Address) -> U256 {
        self.deposits.get(&account).copied().unwrap_or_default()
    }

    fn credit(&mut self, account: Address, amount: U256) {
        let deposit = self.deposits.entry(account).or_default();
        *deposit = deposit.saturating_add(amount);
    }

    fn lock_mut(&mut self, creator: Address, id: u32) -> Result<&mut Lock, EffectError> {
        self.locks
            .get_mut(&(creator, id))
            .ok_or_else(|| EffectError(format!("hodl {id} of {creator} vanished")))
    }

    fn insert_lock(&mut self, lock: Lock) {
        let available = self.deposit_of(lock.creator);
        self.deposits
            .insert(lock.creator, available.saturating_sub(lock.amount_prps));
        self.locks.insert((lock.creator, lock.hodl_id), lock);
    }

    fn release(&mut self, creator: Address, id: u32) {
        if let Some(lock) = self.locks.remove(&(creator, id)) {
            self.credit(lock.prps_beneficiary, lock.amount_prps);
            info!(creator = %creator, hodl_id = id, beneficiary = %lock.prps_beneficiary, amount = %lock.amount_prps, "hodl released");
        }
    }

    fn take_staged(&mut self, op: &PendingOperation) -> Result<(IntentKind, u32), EffectError> {
        self.staged.remove(&(op.account, op.op_id)).ok_or_else(|| {
            EffectError(format!("no staged hodl step for op {} of {}", op.op_id, op.account))
        })
    }
}

impl PendingEffects for LockerState {
    fn commit(&mut self, op: &PendingOperation) -> Result<(), EffectError> {
        let (kind, id) = self.take_staged(op)?;
        let now = self.clock.now();
        match kind {
            IntentKind::Hodl => {
                let lock = self.lock_mut(op.account, id)?;
                lock.locked_at = Some(now);
                lock.occupied = false;
                info!(creator = %op.account, hodl_id = id, "hodl locked");
            }
            IntentKind::Release => self.release(op.account, id),
            IntentKind::Withdrawal => {
                let lock = self.lock_mut(op.account, id)?;
                lock.last_withdrawal = Some(now);
                lock.occupied = false;
                info!(creator = %op.account, hodl_id = id, "hodl withdrawn");
            }
            other => return Err(EffectError(format!("{other:?} is not a hodl step"))),
        }
        Ok(())
    }

    fn undo(&mut self, op: &PendingOperation) -> Result<(), EffectError> {
        let (kind, id) = self.take_staged(op)?;
        if kind == IntentKind::Hodl {
            let lock = self
                .locks
                .remove(&(op.account, id))
                .ok_or_else(|| EffectError(format!("hodl {id} of {} vanished", op.account)))?;
            self.credit(lock.creator, lock.amount_prps);
        } else {
            self.lock_mut(op.account, id)?.occupied = false;
        }
        info!(creator = %op.account, hodl_id = id, kind = ?kind, "hodl step reverted");
        Ok(())
    }
}

/// The locker collaborator.
pub struct HodlLocker {
    domain: Eip712Domain,
    authority: Authority,
    verifier: BoostVerifier,
    state: LockerState,
}

impl HodlLocker {
    pub fn new(
        address: Address,
        config: ProtocolConfig,
        clock: Arc<dyn Clock>,
        registry: SharedRegistry,
    ) -> Result<Self, HodlError> {
        let domain = Eip712Domain::new("Hodl", address).with_chain_id(config.chain_id);
        let mut authority = Authority::new(config.clone(), clock.clone(), registry.clone())?;
        authority.register_recognizer(Box::new(IntentRecognizer::new(domain.clone(), &HODL_KINDS)));
        Ok(Self {
            domain,
            authority,
            verifier: BoostVerifier::new(config, clock.clone(), registry),
            state: LockerState {
                clock,
                deposits: HashMap::new(),
                locks: HashMap::new(),
                staged: HashMap::new(),
            },
        })
    }

    pub fn recognizer(&self) -> IntentRecognizer {
        IntentRecognizer::new(self.domain.clone(), &HODL_KINDS)
    }

    pub fn register_recognizer(&mut self, recognizer: Box<dyn ProofRecognizer>) {
        self.authority.register_recognizer(recognizer);
    }

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn nonce_of(&self, account: Address) -> u64 {
        self.verifier.last_nonce(account)
    }

    /// Unlocked tokens the locker holds for `account`.
    pub fn deposit_of(&self, account: Address) -> U256 {
        self.state.deposit_of(account)
    }

    pub fn lock(&self, creator: Address, hodl_id: u32) -> Option<&Lock> {
        self.state.locks.get(&(creator, hodl_id))
    }

    /// Credits tokens handed over to the locker.
    pub fn deposit(&mut self, account: Address, amount: U256) {
        self.state.credit(account, amount);
        debug!(account = %account, amount = %amount, "deposit");
    }

    fn is_delegated(&self, account: Address) -> bool {
        let now = self.authority.now();
        self.authority.registry().read().is_delegated(account, now)
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    fn check_new_lock(&self, creator: Address, id: u32, amount: U256) -> Result<(), HodlError> {
        if id > MAX_HODL_ID {
            return Err(HodlError::IdOutOfRange(id));
        }
        if amount.is_zero() {
            return Err(HodlError::ZeroAmount);
        }
        if self.state.locks.contains_key(&(creator, id)) {
            return Err(HodlError::AlreadyExists { creator, id });
        }
        let available = self.state.deposit_of(creator);
        if available < amount {
            return Err(HodlError::InsufficientDeposit {
                account: creator,
                available,
                amount,
            });
        }
        Ok(())
    }

    fn check_idle(&self, creator: Address, id: u32) -> Result<&Lock, HodlError> {
        let lock = self
            .state
            .locks
            .get(&(creator, id))
            .ok_or(HodlError::NotFound { creator, id })?;
        if lock.occupied {
            return Err(HodlError::Occupied { creator, id });
        }
        Ok(lock)
    }

    fn check_release(&self, creator: Address, id: u32) -> Result<(), HodlError> {
        let lock = self.check_idle(creator, id)?;
        let Some(unlock_at) = lock.unlock_at() else {
            return Err(HodlError::Infinite { creator, id });
        };
        if self.authority.now() < unlock_at {
            return Err(HodlError::NotExpired {
                creator,
                id,
                unlock_at,
            });
        }
        Ok(())
    }

    fn check_withdrawal(&self, creator: Address, id: u32) -> Result<(), HodlError> {
        let lock = self.check_idle(creator, id)?;
        if !lock.is_infinite() {
            return Err(HodlError::Finite { creator, id });
        }
        Ok(())
    }

    fn stage(&mut self, creator: Address, kind: IntentKind, id: u32) -> Result<u64, HodlError> {
        let op_id = self.authority.stage(creator, kind.tag())?;
        self.state.staged.insert((creator, op_id), (kind, id));
        info!(creator = %creator, hodl_id = id, kind = ?kind, op_id, "hodl step pending");
        Ok(op_id)
    }

    // -----------------------------------------------------------------------
    // Calls by the creator
    // -----------------------------------------------------------------------

    pub fn hodl(
        &mut self,
        creator: Address,
        hodl_id: u32,
        amount_prps: U256,
        duration_days: u16,
        dubi_beneficiary: Address,
        prps_beneficiary: Address,
    ) -> Result<Execution, HodlError> {
        self.check_new_lock(creator, hodl_id, amount_prps)?;
        let mut lock = Lock {
            creator,
            hodl_id,
            amount_prps,
            duration_days,
            dubi_beneficiary,
            prps_beneficiary,
            locked_at: Some(self.authority.now()),
            last_withdrawal: None,
            occupied: false,
        };

        if !self.is_delegated(creator) {
            self.state.insert_lock(lock);
            info!(creator = %creator, hodl_id, amount = %amount_prps, duration_days, "hodl locked");
            return Ok(Execution::Immediate);
        }

        let op_id = self.stage(creator, IntentKind::Hodl, hodl_id)?;
        lock.locked_at = None;
        lock.occupied = true;
        self.state.insert_lock(lock);
        Ok(Execution::Pending { op_id })
    }

    pub fn release(&mut self, creator: Address, hodl_id: u32) -> Result<Execution, HodlError> {
        self.check_release(creator, hodl_id)?;
        if !self.is_delegated(creator) {
            self.state.release(creator, hodl_id);
            return Ok(Execution::Immediate);
        }
        let op_id = self.stage(creator, IntentKind::Release, hodl_id)?;
        self.occupy(creator, hodl_id);
        Ok(Execution::Pending { op_id })
    }

    pub fn withdraw(&mut self, creator: Address, hodl_id: u32) -> Result<Execution, HodlError> {
        self.check_withdrawal(creator, hodl_id)?;
        if !self.is_delegated(creator) {
            self.record_withdrawal(creator, hodl_id);
            return Ok(Execution::Immediate);
        }
        let op_id = self.stage(creator, IntentKind::Withdrawal, hodl_id)?;
        self.occupy(creator, hodl_id);
        Ok(Execution::Pending { op_id })
    }

    fn occupy(&mut self, creator: Address, id: u32) {
        if let Some(lock) = self.state.locks.get_mut(&(creator, id)) {
            lock.occupied = true;
        }
    }

    fn record_withdrawal(&mut self, creator: Address, id: u32) {
        let now = self.authority.now();
        if let Some(lock) = self.state.locks.get_mut(&(creator, id)) {
            lock.last_withdrawal = Some(now);
            info!(creator = %creator, hodl_id = id, "hodl withdrawn");
        }
    }

    // -----------------------------------------------------------------------
    // Boosted calls
    // -----------------------------------------------------------------------

    /// Executes a signed hodl, release or withdrawal submitted by the
    /// creator's booster.
    pub fn boosted(
        &mut self,
        caller: Address,
        intent: &BoostedIntent,
        signature: &Signature,
    ) -> Result<(), HodlError> {
        match intent.body {
            IntentBody::Hodl {
                hodl_id,
                amount_prps,
                duration,
                dubi_beneficiary,
                prps_beneficiary,
                creator,
            } => {
                self.check_new_lock(creator, hodl_id, amount_prps)?;
                self.verifier.verify(caller, intent, &self.domain, signature)?;
                self.state.insert_lock(Lock {
                    creator,
                    hodl_id,
                    amount_prps,
                    duration_days: duration,
                    dubi_beneficiary,
                    prps_beneficiary,
                    locked_at: Some(self.authority.now()),
                    last_withdrawal: None,
                    occupied: false,
                });
                info!(booster = %caller, creator = %creator, hodl_id, "boosted hodl");
            }
            IntentBody::Release { id, creator, .. } => {
                self.check_release(creator, id)?;
                self.verifier.verify(caller, intent, &self.domain, signature)?;
                self.state.release(creator, id);
            }
            IntentBody::Withdrawal { id, creator, .. } => {
                self.check_withdrawal(creator, id)?;
                self.verifier.verify(caller, intent, &self.domain, signature)?;
                self.record_withdrawal(creator, id);
            }
            _ => return Err(HodlError::WrongIntent(intent.kind())),
        }
        Ok(())
    }

    pub fn finalize(
        &mut self,
        caller: Address,
        account: Address,
        op_id: u64,
    ) -> Result<PendingOperation, HodlError> {
        Ok(self.authority.finalize(caller, account, op_id, &mut self.state)?)
    }

    pub fn revert(
        &mut self,
        caller: Address,
        account: Address,
        op_id: u64,
        proof: &[u8],
        signature: &Signature,
    ) -> Result<PendingOperation, HodlError> {
        Ok(self
            .authority
            .revert(caller, account, op_id, proof, signature, &mut self.state)?)
    }
}
