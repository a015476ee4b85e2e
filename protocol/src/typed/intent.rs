//! Boosted intents and their builder.
//!
//! An intent is what an account signs so that its delegate can act for it:
//! a kind-specific body, the fuel it pays with, and the [`BoosterPayload`]
//! that pins the intent to one delegate, one nonce and one moment.
//!
//! [`IntentBuilder`] does not sign. Signing lives in [`super::signing`] so
//! construction stays testable without key material.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::error::CodecError;
use super::schema::IntentKind;
use crate::clock::Clock;
use crate::codec::FuelKind;
use crate::config::AMOUNT_BITS;

/// Width of hodl ids on the wire.
pub const HODL_ID_BITS: usize = 24;

// ---------------------------------------------------------------------------
// Sub-structures
// ---------------------------------------------------------------------------

/// The four fuel sources an intent may draw from. Each is a `uint96`.
///
/// Several may be non-zero in a signed message, but only one takes effect:
/// see [`BoosterFuel::selected`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoosterFuel {
    pub dubi: U256,
    pub unlocked_prps: U256,
    pub locked_prps: U256,
    pub intrinsic_fuel: U256,
}

impl BoosterFuel {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn dubi(amount: U256) -> Self {
        Self { dubi: amount, ..Self::default() }
    }

    pub fn unlocked_prps(amount: U256) -> Self {
        Self { unlocked_prps: amount, ..Self::default() }
    }

    pub fn locked_prps(amount: U256) -> Self {
        Self { locked_prps: amount, ..Self::default() }
    }

    pub fn intrinsic(amount: U256) -> Self {
        Self { intrinsic_fuel: amount, ..Self::default() }
    }

    /// The fuel that takes effect: the first non-zero source in the order
    /// dubi, unlocked, locked, intrinsic. Intrinsic fuel is accounted as
    /// auto-minted dubi.
    pub fn selected(&self) -> (FuelKind, U256) {
        let candidates = [
            (FuelKind::Dubi, self.dubi),
            (FuelKind::UnlockedPrps, self.unlocked_prps),
            (FuelKind::LockedPrps, self.locked_prps),
            (FuelKind::AutoMintedDubi, self.intrinsic_fuel),
        ];
        candidates
            .into_iter()
            .find(|(_, amount)| !amount.is_zero())
            .unwrap_or((FuelKind::None, U256::ZERO))
    }

    fn validate(&self) -> Result<(), CodecError> {
        ensure_width(self.dubi, "dubi", AMOUNT_BITS)?;
        ensure_width(self.unlocked_prps, "unlockedPrps", AMOUNT_BITS)?;
        ensure_width(self.locked_prps, "lockedPrps", AMOUNT_BITS)?;
        ensure_width(self.intrinsic_fuel, "intrinsicFuel", AMOUNT_BITS)
    }
}

/// Binds an intent to the delegate allowed to submit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoosterPayload {
    pub booster: Address,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub nonce: u64,
    /// The account signed through the personal-sign path.
    pub is_legacy_signature: bool,
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// Kind-specific part of an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntentBody {
    Send {
        sender: Address,
        recipient: Address,
        amount: U256,
        data: Vec<u8>,
    },
    Burn {
        account: Address,
        amount: U256,
        data: Vec<u8>,
    },
    Hodl {
        hodl_id: u32,
        amount_prps: U256,
        duration: u16,
        dubi_beneficiary: Address,
        prps_beneficiary: Address,
        creator: Address,
    },
    Release {
        id: u32,
        creator: Address,
        prps_beneficiary: Address,
    },
    Withdrawal {
        id: u32,
        creator: Address,
        prps_beneficiary: Address,
    },
}

impl IntentBody {
    pub fn kind(&self) -> IntentKind {
        match self {
            IntentBody::Send { .. } => IntentKind::Send,
            IntentBody::Burn { .. } => IntentKind::Burn,
            IntentBody::Hodl { .. } => IntentKind::Hodl,
            IntentBody::Release { .. } => IntentKind::Release,
            IntentBody::Withdrawal { .. } => IntentKind::Withdrawal,
        }
    }

    /// The account whose signature authorizes the intent.
    pub fn account(&self) -> Address {
        match self {
            IntentBody::Send { sender, .. } => *sender,
            IntentBody::Burn { account, .. } => *account,
            IntentBody::Hodl { creator, .. }
            | IntentBody::Release { creator, .. }
            | IntentBody::Withdrawal { creator, .. } => *creator,
        }
    }

    fn validate(&self) -> Result<(), CodecError> {
        match self {
            IntentBody::Hodl { hodl_id, amount_prps, .. } => {
                ensure_width(U256::from(*hodl_id), "hodlId", HODL_ID_BITS)?;
                ensure_width(*amount_prps, "amountPrps", AMOUNT_BITS)
            }
            IntentBody::Release { id, .. } | IntentBody::Withdrawal { id, .. } => {
                ensure_width(U256::from(*id), "id", HODL_ID_BITS)
            }
            IntentBody::Send { .. } | IntentBody::Burn { .. } => Ok(()),
        }
    }
}

/// A complete, unsigned boosted intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostedIntent {
    pub body: IntentBody,
    pub fuel: BoosterFuel,
    pub booster_payload: BoosterPayload,
}

impl BoostedIntent {
    pub fn kind(&self) -> IntentKind {
        self.body.kind()
    }

    pub fn account(&self) -> Address {
        self.body.account()
    }

    pub fn booster(&self) -> Address {
        self.booster_payload.booster
    }

    pub fn nonce(&self) -> u64 {
        self.booster_payload.nonce
    }

    pub fn timestamp(&self) -> u64 {
        self.booster_payload.timestamp
    }

    pub fn is_legacy_signature(&self) -> bool {
        self.booster_payload.is_legacy_signature
    }

    /// Checks every narrow field against its declared width.
    pub fn validate(&self) -> Result<(), CodecError> {
        self.body.validate()?;
        self.fuel.validate()
    }
}

pub(crate) fn ensure_width(value: U256, field: &'static str, bits: usize) -> Result<(), CodecError> {
    if value.bit_len() > bits {
        return Err(CodecError::Overflow { field, bits });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// IntentBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`BoostedIntent`]s.
///
/// # Usage
///
/// ```rust
/// use alloy_primitives::{Address, U256};
/// use boost_protocol::clock::ManualClock;
/// use boost_protocol::typed::{BoosterFuel, IntentBuilder};
///
/// let alice = Address::repeat_byte(0xa1);
/// let bob = Address::repeat_byte(0xb0);
/// let relayer = Address::repeat_byte(0xee);
///
/// let intent = IntentBuilder::send(alice, bob, U256::from(100u64))
///     .fuel(BoosterFuel::dubi(U256::from(1u64)))
///     .booster(relayer)
///     .nonce(1)
///     .build(&ManualClock::new(1_700_000_000))
///     .unwrap();
///
/// assert_eq!(intent.account(), alice);
/// assert_eq!(intent.timestamp(), 1_700_000_000);
/// ```
///
/// Defaults: no fuel, zero booster, nonce 0, structured signature, and a
/// timestamp taken from the clock passed to [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct IntentBuilder {
    body: IntentBody,
    fuel: BoosterFuel,
    booster: Address,
    nonce: u64,
    timestamp: Option<u64>,
    is_legacy_signature: bool,
}

impl IntentBuilder {
    fn with_body(body: IntentBody) -> Self {
        Self {
            body,
            fuel: BoosterFuel::none(),
            booster: Address::ZERO,
            nonce: 0,
            timestamp: None,
            is_legacy_signature: false,
        }
    }

    pub fn send(sender: Address, recipient: Address, amount: U256) -> Self {
        Self::with_body(IntentBody::Send {
            sender,
            recipient,
            amount,
            data: Vec::new(),
        })
    }

    pub fn burn(account: Address, amount: U256) -> Self {
        Self::with_body(IntentBody::Burn {
            account,
            amount,
            data: Vec::new(),
        })
    }

    /// A hodl whose beneficiaries default to the creator.
    pub fn hodl(creator: Address, hodl_id: u32, amount_prps: U256, duration: u16) -> Self {
        Self::with_body(IntentBody::Hodl {
            hodl_id,
            amount_prps,
            duration,
            dubi_beneficiary: creator,
            prps_beneficiary: creator,
            creator,
        })
    }

    pub fn release(creator: Address, id: u32) -> Self {
        Self::with_body(IntentBody::Release {
            id,
            creator,
            prps_beneficiary: creator,
        })
    }

    pub fn withdrawal(creator: Address, id: u32) -> Self {
        Self::with_body(IntentBody::Withdrawal {
            id,
            creator,
            prps_beneficiary: creator,
        })
    }

    /// Attaches the opaque `data` payload. Ignored for kinds without one.
    pub fn data(mut self, payload: impl Into<Vec<u8>>) -> Self {
        if let IntentBody::Send { data, .. } | IntentBody::Burn { data, .. } = &mut self.body {
            *data = payload.into();
        }
        self
    }

    /// Sets the prps beneficiary of a hodl, release or withdrawal.
    pub fn prps_beneficiary(mut self, beneficiary: Address) -> Self {
        match &mut self.body {
            IntentBody::Hodl { prps_beneficiary, .. }
            | IntentBody::Release { prps_beneficiary, .. }
            | IntentBody::Withdrawal { prps_beneficiary, .. } => *prps_beneficiary = beneficiary,
            IntentBody::Send { .. } | IntentBody::Burn { .. } => {}
        }
        self
    }

    /// Sets the dubi beneficiary of a hodl.
    pub fn dubi_beneficiary(mut self, beneficiary: Address) -> Self {
        if let IntentBody::Hodl { dubi_beneficiary, .. } = &mut self.body {
            *dubi_beneficiary = beneficiary;
        }
        self
    }

    pub fn fuel(mut self, fuel: BoosterFuel) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn booster(mut self, booster: Address) -> Self {
        self.booster = booster;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the timestamp explicitly. Otherwise `build` reads the clock.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Marks the intent as signed through the personal-sign path.
    pub fn legacy_signature(mut self, legacy: bool) -> Self {
        self.is_legacy_signature = legacy;
        self
    }

    /// Consumes the builder. Fails if a narrow field overflows its width.
    pub fn build(self, clock: &dyn Clock) -> Result<BoostedIntent, CodecError> {
        let timestamp = self.timestamp.unwrap_or_else(|| clock.now());
        let intent = BoostedIntent {
            body: self.body,
            fuel: self.fuel,
            booster_payload: BoosterPayload {
                booster: self.booster,
                timestamp,
                nonce: self.nonce,
                is_legacy_signature: self.is_legacy_signature,
            },
        };
        intent.validate()?;
        Ok(intent)
    }
}
