//! # Delegation Registry
//!
//! Tracks, per account, which delegate (relayer) may submit on its behalf.
//!
//! Each account is in one of three states:
//!
//! ```text
//!             opt_out                      now >= until
//! Delegated ──────────► PendingRevoke(until) ────────────► Undelegated
//!     ▲    ╲                    │                              │
//!     │     ╲ instant_opt_out   │ instant_opt_out              │
//!     │      ╲──────────────────┴─────────────────────────────►│
//!     │                                                        │
//!     └──────────────────────── opt_in ────────────────────────┘
//! ```
//!
//! A pending revoke still counts as delegated. Once it elapses the
//! delegation is void and only an explicit opt-in restores one.
//!
//! Every address starts out delegated to the registry's default delegate.
//! That is library behavior rather than stored state: an account without a
//! record is delegated to the default delegate, so the registry never has
//! to enumerate accounts. Participants (the collaborators themselves) and
//! the default delegate share that starting point but can never opt back
//! in once they leave it.

use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ProtocolConfig;

/// Errors raised by registry transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DelegationError {
    #[error("account is already delegated")]
    AlreadyDelegated,

    #[error("cannot delegate to the zero address")]
    ZeroDelegate,

    #[error("the default delegate cannot opt in")]
    DefaultDelegateCannotOptIn,

    #[error("participant {0} cannot re-delegate")]
    ParticipantCannotRedelegate(Address),

    #[error("account is not delegated")]
    NotDelegated,

    #[error("an opt-out is already pending")]
    OptOutPending,

    #[error("caller is not the account's effective delegate")]
    NotEffectiveDelegate,

    #[error("caller is not the owner")]
    NotOwner,
}

/// Delegation state of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DelegationState {
    Delegated { delegate: Address },
    PendingRevoke { delegate: Address, until: u64 },
    Undelegated,
}

impl DelegationState {
    /// The state as seen at `now`: an elapsed pending revoke is void.
    pub fn at(self, now: u64) -> Self {
        match self {
            DelegationState::PendingRevoke { until, .. } if now >= until => {
                DelegationState::Undelegated
            }
            other => other,
        }
    }

    /// The delegate currently in force, if any.
    pub fn delegate(self) -> Option<Address> {
        match self {
            DelegationState::Delegated { delegate }
            | DelegationState::PendingRevoke { delegate, .. } => Some(delegate),
            DelegationState::Undelegated => None,
        }
    }
}

/// Snapshot of an account's delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationStatus {
    pub is_delegated: bool,
    pub delegate: Option<Address>,
    /// Seconds until a pending opt-out takes effect, 0 if none is pending.
    pub pending_revoke_remaining: u64,
    pub perma_boost_active: bool,
}

/// The registry of delegations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRegistry {
    owner: Option<Address>,
    default_delegate: Address,
    opt_out_period: u64,
    perma_boost_active: bool,
    participants: HashSet<Address>,
    records: HashMap<Address, DelegationState>,
}

impl DelegationRegistry {
    /// A registry in which every address is delegated to `default_delegate`.
    pub fn new(owner: Address, default_delegate: Address, opt_out_period: u64) -> Self {
        Self {
            owner: Some(owner),
            default_delegate,
            opt_out_period,
            perma_boost_active: false,
            participants: HashSet::new(),
            records: HashMap::new(),
        }
    }

    pub fn from_config(owner: Address, default_delegate: Address, config: &ProtocolConfig) -> Self {
        Self::new(owner, default_delegate, config.opt_out_period)
    }

    /// Adds the initial set of non-account participants.
    pub fn with_participants(mut self, participants: impl IntoIterator<Item = Address>) -> Self {
        self.participants.extend(participants);
        self
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub fn default_delegate(&self) -> Address {
        self.default_delegate
    }

    pub fn opt_out_period(&self) -> u64 {
        self.opt_out_period
    }

    pub fn perma_boost_active(&self) -> bool {
        self.perma_boost_active
    }

    pub fn is_participant(&self, address: Address) -> bool {
        self.participants.contains(&address)
    }

    /// The account's state at `now`.
    pub fn state(&self, account: Address, now: u64) -> DelegationState {
        self.records
            .get(&account)
            .copied()
            .unwrap_or(DelegationState::Delegated {
                delegate: self.default_delegate,
            })
            .at(now)
    }

    pub fn is_delegated(&self, account: Address, now: u64) -> bool {
        self.effective_delegate(account, now).is_some()
    }

    /// The delegate in force at `now`, including one whose revoke is pending.
    pub fn effective_delegate(&self, account: Address, now: u64) -> Option<Address> {
        self.state(account, now).delegate()
    }

    pub fn is_delegated_to(&self, account: Address, delegate: Address, now: u64) -> bool {
        self.effective_delegate(account, now) == Some(delegate)
    }

    pub fn pending_opt_out_remaining(&self, account: Address, now: u64) -> u64 {
        match self.state(account, now) {
            DelegationState::PendingRevoke { until, .. } => until - now,
            _ => 0,
        }
    }

    pub fn status(&self, account: Address, now: u64) -> DelegationStatus {
        let delegate = self.effective_delegate(account, now);
        DelegationStatus {
            is_delegated: delegate.is_some(),
            delegate,
            pending_revoke_remaining: self.pending_opt_out_remaining(account, now),
            perma_boost_active: self.perma_boost_active,
        }
    }

    /// Statuses of two accounts at once; transfers need both sides.
    pub fn status_pair(
        &self,
        a: Address,
        b: Address,
        now: u64,
    ) -> (DelegationStatus, DelegationStatus) {
        (self.status(a, now), self.status(b, now))
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// `caller` delegates to `delegate`.
    pub fn opt_in(
        &mut self,
        caller: Address,
        delegate: Address,
        now: u64,
    ) -> Result<(), DelegationError> {
        if delegate == Address::ZERO {
            return Err(DelegationError::ZeroDelegate);
        }
        if self.is_delegated(caller, now) {
            return Err(DelegationError::AlreadyDelegated);
        }
        if self.is_participant(caller) {
            return Err(DelegationError::ParticipantCannotRedelegate(caller));
        }
        if caller == self.default_delegate {
            return Err(DelegationError::DefaultDelegateCannotOptIn);
        }

        self.records
            .insert(caller, DelegationState::Delegated { delegate });
        info!(account = %caller, delegate = %delegate, "opted in");
        Ok(())
    }

    /// Starts revoking `caller`'s delegation. It stays in force for one
    /// opt-out period.
    pub fn opt_out(&mut self, caller: Address, now: u64) -> Result<u64, DelegationError> {
        let delegate = match self.state(caller, now) {
            DelegationState::Delegated { delegate } => delegate,
            DelegationState::PendingRevoke { .. } => return Err(DelegationError::OptOutPending),
            DelegationState::Undelegated => return Err(DelegationError::NotDelegated),
        };

        let until = now + self.opt_out_period;
        self.records
            .insert(caller, DelegationState::PendingRevoke { delegate, until });
        info!(account = %caller, delegate = %delegate, until, "opt-out pending");
        Ok(until)
    }

    /// The effective delegate of `account` drops it immediately, whether or
    /// not a revoke is already pending.
    pub fn instant_opt_out(
        &mut self,
        caller: Address,
        account: Address,
        now: u64,
    ) -> Result<(), DelegationError> {
        let delegate = self
            .effective_delegate(account, now)
            .ok_or(DelegationError::NotDelegated)?;
        if delegate != caller {
            return Err(DelegationError::NotEffectiveDelegate);
        }

        self.records.insert(account, DelegationState::Undelegated);
        info!(account = %account, delegate = %delegate, "instant opt-out");
        Ok(())
    }

    /// Adds a participant. Owner only, so only before perma-boost.
    pub fn register_participant(
        &mut self,
        caller: Address,
        participant: Address,
    ) -> Result<(), DelegationError> {
        self.ensure_owner(caller)?;
        if self.participants.insert(participant) {
            debug!(participant = %participant, "participant registered");
        }
        Ok(())
    }

    /// Makes default delegation permanent and gives up the owner role. Can
    /// only happen once.
    pub fn activate_perma_boost_and_renounce(&mut self, caller: Address) -> Result<(), DelegationError> {
        self.ensure_owner(caller)?;
        self.perma_boost_active = true;
        self.owner = None;
        info!(previous_owner = %caller, "perma-boost activated, ownership renounced");
        Ok(())
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), DelegationError> {
        match self.owner {
            Some(owner) if owner == caller => Ok(()),
            _ => Err(DelegationError::NotOwner),
        }
    }
}
