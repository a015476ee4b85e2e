//! Compact integer codecs.
//!
//! Collaborators log mint and burn records as single packed words rather
//! than as separate fields. See [`amount`] for the layouts.

pub mod amount;

pub use amount::{
    pack_burn, pack_burn_with_fuel, pack_mint, unpack_burn, unpack_mint, AmountError, BurnRecord,
    FuelKind,
};
