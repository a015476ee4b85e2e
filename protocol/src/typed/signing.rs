//! Signing and verifying boosted intents.
//!
//! An intent flagged `is_legacy_signature` was signed through the
//! personal-sign path and is only ever checked on that path. Any other
//! intent is checked on the structured path first and falls back to
//! personal-sign, since wallets that cannot sign structured data still sign
//! the same digest.

use alloy_primitives::{Address, B256};
use tracing::debug;

use super::encoding::signing_hash;
use super::intent::BoostedIntent;
use super::schema::Eip712Domain;
use crate::crypto::keys::{BoostKeypair, KeyError};
use crate::crypto::signatures::{
    PersonalSignPath, Signature, SignatureError, SigningPath, StructuredPath,
};

/// The digest an account signs for `intent` under `domain`.
pub fn hash_intent(intent: &BoostedIntent, domain: &Eip712Domain) -> B256 {
    signing_hash(intent, domain)
}

/// Signs `intent` the way its legacy flag says it was signed.
pub fn sign_intent(
    intent: &BoostedIntent,
    domain: &Eip712Domain,
    keypair: &BoostKeypair,
) -> Result<Signature, KeyError> {
    let digest = signing_hash(intent, domain);
    if intent.is_legacy_signature() {
        PersonalSignPath.sign(keypair, &digest)
    } else {
        StructuredPath.sign(keypair, &digest)
    }
}

/// Recovers the signer of `intent`.
///
/// Returns the intent's account if any permitted path recovers it.
/// Otherwise returns the address the primary path recovered, which the
/// caller will find does not match.
pub fn verify_intent(
    intent: &BoostedIntent,
    domain: &Eip712Domain,
    signature: &Signature,
) -> Result<Address, SignatureError> {
    let digest = signing_hash(intent, domain);
    verify_digest(&digest, intent.account(), intent.is_legacy_signature(), signature)
}

/// [`verify_intent`] for a digest that has already been computed.
pub fn verify_digest(
    digest: &B256,
    expected: Address,
    is_legacy_signature: bool,
    signature: &Signature,
) -> Result<Address, SignatureError> {
    if is_legacy_signature {
        return PersonalSignPath.recover(digest, signature);
    }

    let structured = StructuredPath.recover(digest, signature);
    if matches!(structured, Ok(signer) if signer == expected) {
        return structured;
    }

    match PersonalSignPath.recover(digest, signature) {
        Ok(signer) if signer == expected => {
            debug!(%signer, "signature accepted on personal-sign fallback");
            Ok(signer)
        }
        _ => structured,
    }
}

/// Whether `signature` is the intent's account's signature on a permitted
/// path.
pub fn is_signed_by_account(
    intent: &BoostedIntent,
    domain: &Eip712Domain,
    signature: &Signature,
) -> bool {
    matches!(verify_intent(intent, domain, signature), Ok(signer) if signer == intent.account())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::signatures::repair_recovery_byte;
    use crate::typed::intent::IntentBuilder;
    use alloy_primitives::U256;

    fn alice() -> BoostKeypair {
        BoostKeypair::from_seed_phrase("alice").unwrap()
    }

    fn domain() -> Eip712Domain {
        Eip712Domain::new("Purpose", Address::repeat_byte(0x42))
    }

    fn burn(legacy: bool) -> BoostedIntent {
        IntentBuilder::burn(alice().address(), U256::from(1_000u64))
            .booster(Address::repeat_byte(0xee))
            .nonce(1)
            .legacy_signature(legacy)
            .build(&ManualClock::new(1_700_000_000))
            .unwrap()
    }

    #[test]
    fn test_structured_signature_verifies() {
        let intent = burn(false);
        let sig = sign_intent(&intent, &domain(), &alice()).unwrap();
        assert_eq!(verify_intent(&intent, &domain(), &sig).unwrap(), alice().address());
        assert!(is_signed_by_account(&intent, &domain(), &sig));
    }

    #[test]
    fn test_legacy_flag_uses_personal_path() {
        let intent = burn(true);
        let sig = sign_intent(&intent, &domain(), &alice()).unwrap();
        assert!(is_signed_by_account(&intent, &domain(), &sig));

        // A structured signature does not satisfy a legacy intent.
        let digest = hash_intent(&intent, &domain());
        let structured = StructuredPath.sign(&alice(), &digest).unwrap();
        assert!(!is_signed_by_account(&intent, &domain(), &structured));
    }

    #[test]
    fn test_personal_sign_fallback_without_flag() {
        let intent = burn(false);
        let digest = hash_intent(&intent, &domain());
        let mut personal = PersonalSignPath.sign(&alice(), &digest).unwrap();
        // Generic signers often emit a 0/1 recovery byte.
        personal.v -= 27;
        assert!(is_signed_by_account(&intent, &domain(), &personal));
        assert!(is_signed_by_account(&intent, &domain(), &repair_recovery_byte(personal)));
    }

    #[test]
    fn test_wrong_domain_or_values_fail() {
        let intent = burn(false);
        let sig = sign_intent(&intent, &domain(), &alice()).unwrap();

        let other_domain = Eip712Domain::new("Hodl", Address::repeat_byte(0x42));
        assert!(!is_signed_by_account(&intent, &other_domain, &sig));

        let mut tampered = intent.clone();
        tampered.booster_payload.nonce = 2;
        assert!(!is_signed_by_account(&tampered, &domain(), &sig));
    }

    #[test]
    fn test_other_signer_is_reported() {
        let intent = burn(false);
        let mallory = BoostKeypair::from_seed_phrase("mallory").unwrap();
        let sig = sign_intent(&intent, &domain(), &mallory).unwrap();
        assert_eq!(verify_intent(&intent, &domain(), &sig).unwrap(), mallory.address());
    }
}
