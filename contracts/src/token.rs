//! # Boosted Token
//!
//! A fungible token whose holders can delegate submission to a booster.
//!
//! While an account is delegated, its own `transfer` and `burn` calls are
//! staged: the amount leaves the account's balance and sits in escrow until
//! the pending operation is finalized (the recipient is credited, or the
//! burn is recorded) or reverted (the amount returns to the account). An
//! account that is not delegated transfers and burns immediately.
//!
//! Boosted calls (`boosted_send`, `boosted_burn`) carry the account's signed
//! intent and execute immediately once the submission checks pass.
//!
//! ## Audit words
//!
//! Every mint and every final burn is logged as a single packed word, see
//! [`boost_protocol::codec`].

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use thiserror::Error;
use tracing::{debug, info};

use boost_protocol::authority::{
    AuthError, Authority, BoostVerifier, EffectError, IntentRecognizer, PendingEffects,
    ProofRecognizer, SharedRegistry,
};
use boost_protocol::clock::Clock;
use boost_protocol::codec::{pack_burn_with_fuel, pack_mint, AmountError, FuelKind};
use boost_protocol::config::{ConfigError, ProtocolConfig, AMOUNT_BITS};
use boost_protocol::crypto::Signature;
use boost_protocol::ledger::PendingOperation;
use boost_protocol::typed::{BoostedIntent, Eip712Domain, IntentBody, IntentKind};

use crate::Execution;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("insufficient balance: {account} has {balance}, needs {amount}")]
    InsufficientBalance {
        account: Address,
        balance: U256,
        amount: U256,
    },

    #[error("sender and recipient must differ: both are {0}")]
    SelfTransfer(Address),

    #[error("amount must be > 0")]
    ZeroAmount,

    /// Total supply would no longer fit the mint word.
    #[error("supply overflow: minting {amount} exceeds the supply width")]
    SupplyOverflow { amount: U256 },

    #[error("expected a {expected:?} intent, got {got:?}")]
    WrongIntent { expected: IntentKind, got: IntentKind },

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Bits left for the total supply in a mint word.
const SUPPLY_BITS: usize = 256 - AMOUNT_BITS;

fn ensure_amount(amount: U256) -> Result<(), TokenError> {
    if amount.is_zero() {
        return Err(TokenError::ZeroAmount);
    }
    if amount.bit_len() > AMOUNT_BITS {
        return Err(AmountError::Overflow {
            field: "amount",
            bits: AMOUNT_BITS,
        }
        .into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagedEffect {
    Transfer { to: Address, amount: U256 },
    Burn { amount: U256 },
}

impl StagedEffect {
    fn amount(self) -> U256 {
        match self {
            StagedEffect::Transfer { amount, .. } | StagedEffect::Burn { amount } => amount,
        }
    }
}

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<Address, U256>,
    total_supply: U256,
    escrowed: U256,
    staged: HashMap<(Address, u64), StagedEffect>,
    burn_log: Vec<U256>,
}

impl TokenState {
    fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn ensure_balance(&self, account: Address, amount: U256) -> Result<(), TokenError> {
        let balance = self.balance_of(account);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                account,
                balance,
                amount,
            });
        }
        Ok(())
    }

    fn debit(&mut self, account: Address, amount: U256) -> Result<(), TokenError> {
        self.ensure_balance(account, amount)?;
        let balance = self.balances.entry(account).or_default();
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: U256) {
        // Balances never exceed the total supply, which is bounded.
        let balance = self.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Removes `amount` from the supply and records the burn word.
    fn record_burn(
        &mut self,
        account: Address,
        amount: U256,
        fuel: FuelKind,
        fuel_amount: U256,
    ) -> Result<U256, AmountError> {
        let word = pack_burn_with_fuel(amount, fuel, fuel_amount)?;
        self.total_supply -= amount;
        self.burn_log.push(word);
        info!(account = %account, amount = %amount, fuel = %fuel, packed = %word, "burned");
        Ok(word)
    }

    fn take_staged(&mut self, op: &PendingOperation) -> Result<StagedEffect, EffectError> {
        self.staged.remove(&(op.account, op.op_id)).ok_or_else(|| {
            EffectError(format!("no staged effect for op {} of {}", op.op_id, op.account))
        })
    }
}

impl PendingEffects for TokenState {
    fn commit(&mut self, op: &PendingOperation) -> Result<(), EffectError> {
        let effect = self.take_staged(op)?;
        self.escrowed -= effect.amount();
        match effect {
            StagedEffect::Transfer { to, amount } => {
                self.credit(to, amount);
                info!(from = %op.account, to = %to, amount = %amount, op_id = op.op_id, "transfer finalized");
            }
            StagedEffect::Burn { amount } => {
                // Width was checked when the burn was staged.
                self.record_burn(op.account, amount, FuelKind::None, U256::ZERO)
                    .map_err(|err| EffectError(err.to_string()))?;
            }
        }
        Ok(())
    }

    fn undo(&mut self, op: &PendingOperation) -> Result<(), EffectError> {
        let effect = self.take_staged(op)?;
        self.escrowed -= effect.amount();
        self.credit(op.account, effect.amount());
        info!(account = %op.account, amount = %effect.amount(), op_id = op.op_id, "staged effect refunded");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BoostedToken
// ---------------------------------------------------------------------------

/// The token collaborator.
pub struct BoostedToken {
    domain: Eip712Domain,
    authority: Authority,
    verifier: BoostVerifier,
    state: TokenState,
}

impl BoostedToken {
    /// Creates an empty token deployed at `address`. Signed intents are
    /// bound to the domain `(name, address, config.chain_id)`.
    pub fn new(
        name: &str,
        address: Address,
        config: ProtocolConfig,
        clock: Arc<dyn Clock>,
        registry: SharedRegistry,
    ) -> Result<Self, TokenError> {
        let domain = Eip712Domain::new(name, address).with_chain_id(config.chain_id);
        let mut authority = Authority::new(config.clone(), clock.clone(), registry.clone())?;
        let recognizer = IntentRecognizer::new(domain.clone(), &[IntentKind::Send, IntentKind::Burn]);
        authority.register_recognizer(Box::new(recognizer));
        Ok(Self {
            domain,
            authority,
            verifier: BoostVerifier::new(config, clock, registry),
            state: TokenState::default(),
        })
    }

    /// A recognizer for this token's intents, for other collaborators to
    /// accept them as revert proofs.
    pub fn recognizer(&self) -> IntentRecognizer {
        IntentRecognizer::new(self.domain.clone(), &[IntentKind::Send, IntentKind::Burn])
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

    pub fn balance_of(&self, account: Address) -> U256 {
        self.state.balance_of(account)
    }

    pub fn total_supply(&self) -> U256 {
        self.state.total_supply
    }

    /// Amount held for staged transfers and burns.
    pub fn escrowed(&self) -> U256 {
        self.state.escrowed
    }

    /// Last boosted nonce consumed by `account`.
    pub fn nonce_of(&self, account: Address) -> u64 {
        self.verifier.last_nonce(account)
    }

    /// Packed words of every final burn, oldest first.
    pub fn burn_log(&self) -> &[U256] {
        &self.state.burn_log
    }

    fn is_delegated(&self, account: Address) -> bool {
        let now = self.authority.now();
        self.authority.registry().read().is_delegated(account, now)
    }

    /// Mints `amount` to `to` and returns the packed mint word.
    pub fn mint(&mut self, to: Address, amount: U256) -> Result<U256, TokenError> {
        ensure_amount(amount)?;
        let supply = self
            .state
            .total_supply
            .checked_add(amount)
            .filter(|s| s.bit_len() <= SUPPLY_BITS)
            .ok_or(TokenError::SupplyOverflow { amount })?;

        self.state.total_supply = supply;
        self.state.credit(to, amount);
        let word = pack_mint(supply, amount);
        info!(to = %to, amount = %amount, packed = %word, "minted");
        Ok(word)
    }

    /// Transfer by the account itself.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<Execution, TokenError> {
        if amount.is_zero() {
            return Err(TokenError::ZeroAmount);
        }
        if from == to {
            return Err(TokenError::SelfTransfer(from));
        }
        self.state.ensure_balance(from, amount)?;

        if !self.is_delegated(from) {
            self.state.debit(from, amount)?;
            self.state.credit(to, amount);
            debug!(from = %from, to = %to, amount = %amount, "transferred");
            return Ok(Execution::Immediate);
        }

        let op_id = self.authority.stage(from, IntentKind::Send.tag())?;
        self.stage_effect(from, op_id, StagedEffect::Transfer { to, amount })?;
        info!(from = %from, to = %to, amount = %amount, op_id, "transfer pending");
        Ok(Execution::Pending { op_id })
    }

    /// Burn by the account itself.
    pub fn burn(&mut self, account: Address, amount: U256) -> Result<Execution, TokenError> {
        ensure_amount(amount)?;
        self.state.ensure_balance(account, amount)?;

        if !self.is_delegated(account) {
            self.state.debit(account, amount)?;
            self.state.record_burn(account, amount, FuelKind::None, U256::ZERO)?;
            return Ok(Execution::Immediate);
        }

        let op_id = self.authority.stage(account, IntentKind::Burn.tag())?;
        self.stage_effect(account, op_id, StagedEffect::Burn { amount })?;
        info!(account = %account, amount = %amount, op_id, "burn pending");
        Ok(Execution::Pending { op_id })
    }

    fn stage_effect(
        &mut self,
        account: Address,
        op_id: u64,
        effect: StagedEffect,
    ) -> Result<(), TokenError> {
        self.state.debit(account, effect.amount())?;
        self.state.escrowed += effect.amount();
        self.state.staged.insert((account, op_id), effect);
        Ok(())
    }

    /// Executes a signed send submitted by the sender's booster.
    pub fn boosted_send(
        &mut self,
        caller: Address,
        intent: &BoostedIntent,
        signature: &Signature,
    ) -> Result<(), TokenError> {
        let IntentBody::Send {
            sender,
            recipient,
            amount,
            ..
        } = intent.body
        else {
            return Err(TokenError::WrongIntent {
                expected: IntentKind::Send,
                got: intent.kind(),
            });
        };
        if amount.is_zero() {
            return Err(TokenError::ZeroAmount);
        }
        if sender == recipient {
            return Err(TokenError::SelfTransfer(sender));
        }
        self.state.ensure_balance(sender, amount)?;
        self.verifier.verify(caller, intent, &self.domain, signature)?;

        self.state.debit(sender, amount)?;
        self.state.credit(recipient, amount);
        info!(booster = %caller, from = %sender, to = %recipient, amount = %amount, "boosted send");
        Ok(())
    }

    /// Executes a signed burn submitted by the account's booster. The
    /// burn word records the fuel the intent selected.
    pub fn boosted_burn(
        &mut self,
        caller: Address,
        intent: &BoostedIntent,
        signature: &Signature,
    ) -> Result<U256, TokenError> {
        let IntentBody::Burn {
            account, amount, ..
        } = intent.body
        else {
            return Err(TokenError::WrongIntent {
                expected: IntentKind::Burn,
                got: intent.kind(),
            });
        };
        ensure_amount(amount)?;
        self.state.ensure_balance(account, amount)?;
        self.verifier.verify(caller, intent, &self.domain, signature)?;

        self.state.debit(account, amount)?;
        let (fuel, fuel_amount) = intent.fuel.selected();
        Ok(self.state.record_burn(account, amount, fuel, fuel_amount)?)
    }

    pub fn finalize(
        &mut self,
        caller: Address,
        account: Address,
        op_id: u64,
    ) -> Result<PendingOperation, TokenError> {
        Ok(self.authority.finalize(caller, account, op_id, &mut self.state)?)
    }

    pub fn revert(
        &mut self,
        caller: Address,
        account: Address,
        op_id: u64,
        proof: &[u8],
        signature: &Signature,
    ) -> Result<PendingOperation, TokenError> {
        Ok(self
            .authority
            .revert(caller, account, op_id, proof, signature, &mut self.state)?)
    }
}
