//! # Typed Messages
//!
//! Canonical construction, hashing, encoding and signing of the intents an
//! account hands to its delegate. The same signed intent serves twice: as
//! the authorization a collaborator checks before executing a boosted call,
//! and later as the proof a delegate presents to revert the pending
//! operation it created.

pub mod encoding;
pub mod error;
pub mod intent;
pub mod schema;
pub mod signing;

pub use encoding::{decode, encode, hash_struct, signing_hash};
pub use error::CodecError;
pub use intent::{BoostedIntent, BoosterFuel, BoosterPayload, IntentBody, IntentBuilder};
pub use schema::{Eip712Domain, IntentKind};
pub use signing::{hash_intent, is_signed_by_account, sign_intent, verify_digest, verify_intent};
