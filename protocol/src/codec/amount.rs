//! Bit-packed amount words.
//!
//! Two layouts, both emitted in logs so that a single word carries a whole
//! mint or burn record:
//!
//! ```text
//! mint:  [ total supply after mint : 160 ][ amount : 96 ]
//! burn:  [ unused : 61 ][ fuel amount : 96 ][ fuel kind : 3 ][ amount : 96 ]
//! ```

use std::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{AMOUNT_BITS, FUEL_KIND_BITS};

/// Errors raised while packing or interpreting amount words.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("{field} does not fit in {bits} bits")]
    Overflow { field: &'static str, bits: usize },

    #[error("unknown fuel kind {0}")]
    UnknownFuelKind(u8),
}

/// The source a boosted intent draws its fuel from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FuelKind {
    None = 0,
    UnlockedPrps = 1,
    LockedPrps = 2,
    Dubi = 3,
    AutoMintedDubi = 4,
}

impl FuelKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FuelKind {
    type Error = AmountError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FuelKind::None),
            1 => Ok(FuelKind::UnlockedPrps),
            2 => Ok(FuelKind::LockedPrps),
            3 => Ok(FuelKind::Dubi),
            4 => Ok(FuelKind::AutoMintedDubi),
            other => Err(AmountError::UnknownFuelKind(other)),
        }
    }
}

impl fmt::Display for FuelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FuelKind::None => "none",
            FuelKind::UnlockedPrps => "unlocked-prps",
            FuelKind::LockedPrps => "locked-prps",
            FuelKind::Dubi => "dubi",
            FuelKind::AutoMintedDubi => "auto-minted-dubi",
        };
        f.write_str(name)
    }
}

/// The three fields of a packed burn word.
///
/// `fuel_kind` is kept raw: every 3-bit value survives a round trip, and
/// [`BurnRecord::fuel`] interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnRecord {
    pub amount: U256,
    pub fuel_kind: u8,
    pub fuel_amount: U256,
}

impl BurnRecord {
    /// The fuel kind as an enum, if it is one the protocol knows.
    pub fn fuel(&self) -> Result<FuelKind, AmountError> {
        FuelKind::try_from(self.fuel_kind)
    }
}

fn low_mask(bits: usize) -> U256 {
    (U256::from(1u8) << bits) - U256::from(1u8)
}

fn ensure_fits(value: U256, field: &'static str, bits: usize) -> Result<(), AmountError> {
    if value.bit_len() > bits {
        return Err(AmountError::Overflow { field, bits });
    }
    Ok(())
}

/// Packs a mint record: `total_supply_after_mint << 96 | amount`.
///
/// Pure bit placement. The caller guarantees `amount < 2^96` and that the
/// supply fits in the remaining 160 bits; nothing is checked or masked.
pub fn pack_mint(total_supply_after_mint: U256, amount: U256) -> U256 {
    let packed = (total_supply_after_mint << AMOUNT_BITS) | amount;
    debug!(
        total_supply = %total_supply_after_mint,
        amount = %amount,
        packed = %packed,
        "packed mint word"
    );
    packed
}

/// Splits a mint word into `(total_supply_after_mint, amount)`.
pub fn unpack_mint(word: U256) -> (U256, U256) {
    (word >> AMOUNT_BITS, word & low_mask(AMOUNT_BITS))
}

/// Packs a burn record. Every field must fit its width.
pub fn pack_burn(amount: U256, fuel_kind: u8, fuel_amount: U256) -> Result<U256, AmountError> {
    ensure_fits(amount, "amount", AMOUNT_BITS)?;
    ensure_fits(U256::from(fuel_kind), "fuel kind", FUEL_KIND_BITS)?;
    ensure_fits(fuel_amount, "fuel amount", AMOUNT_BITS)?;

    let packed = amount
        | (U256::from(fuel_kind) << AMOUNT_BITS)
        | (fuel_amount << (AMOUNT_BITS + FUEL_KIND_BITS));
    debug!(
        amount = %amount,
        fuel_kind,
        fuel_amount = %fuel_amount,
        packed = %packed,
        "packed burn word"
    );
    Ok(packed)
}

/// [`pack_burn`] for a known fuel kind.
pub fn pack_burn_with_fuel(
    amount: U256,
    fuel: FuelKind,
    fuel_amount: U256,
) -> Result<U256, AmountError> {
    pack_burn(amount, fuel.as_u8(), fuel_amount)
}

/// Splits a burn word into its fields. Bits above the fuel amount are
/// ignored.
pub fn unpack_burn(word: U256) -> BurnRecord {
    let kind_word = (word >> AMOUNT_BITS) & low_mask(FUEL_KIND_BITS);
    BurnRecord {
        amount: word & low_mask(AMOUNT_BITS),
        fuel_kind: kind_word.as_limbs()[0] as u8,
        fuel_amount: (word >> (AMOUNT_BITS + FUEL_KIND_BITS)) & low_mask(AMOUNT_BITS),
    }
}
