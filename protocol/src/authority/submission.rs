//! Validation of boosted submissions.
//!
//! Before a collaborator executes an intent on behalf of an account, the
//! submitting delegate must prove it holds the account's current trust and
//! the account's fresh signature. [`BoostVerifier`] keeps the per-account
//! nonces of one collaborator and runs those checks.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::Address;
use tracing::{debug, warn};

use super::error::AuthError;
use super::SharedRegistry;
use crate::clock::Clock;
use crate::config::ProtocolConfig;
use crate::crypto::signatures::Signature;
use crate::typed::{verify_intent, BoostedIntent, Eip712Domain};

/// Checks delegated intents and tracks the nonces they consume.
pub struct BoostVerifier {
    config: ProtocolConfig,
    clock: Arc<dyn Clock>,
    registry: SharedRegistry,
    nonces: HashMap<Address, u64>,
}

impl BoostVerifier {
    pub fn new(config: ProtocolConfig, clock: Arc<dyn Clock>, registry: SharedRegistry) -> Self {
        Self {
            config,
            clock,
            registry,
            nonces: HashMap::new(),
        }
    }

    /// Last nonce `account` used with this collaborator, 0 if none.
    pub fn last_nonce(&self, account: Address) -> u64 {
        self.nonces.get(&account).copied().unwrap_or(0)
    }

    /// Runs every check without consuming the nonce.
    ///
    /// The checks, in order:
    ///
    /// 1. **Booster** — `caller` is the intent's booster and the account's
    ///    effective delegate.
    /// 2. **Nonce** — exactly one above the last consumed nonce.
    /// 3. **Timestamp** — within `[now - opt_out_period, now + max_future_skew]`.
    /// 4. **Signature** — recovers to the intent's account.
    pub fn check(
        &self,
        caller: Address,
        intent: &BoostedIntent,
        domain: &Eip712Domain,
        signature: &Signature,
    ) -> Result<(), AuthError> {
        let account = intent.account();
        let now = self.clock.now();

        // 1. Booster.
        let booster = intent.booster();
        if caller != booster {
            return Err(AuthError::BoosterMismatch { caller, booster });
        }
        let effective = self.registry.read().effective_delegate(account, now);
        if effective != Some(caller) {
            return Err(AuthError::NotDelegated { account });
        }

        // 2. Nonce.
        let expected = self.last_nonce(account) + 1;
        if intent.nonce() != expected {
            return Err(AuthError::InvalidNonce {
                expected,
                got: intent.nonce(),
            });
        }

        // 3. Timestamp.
        let timestamp = intent.timestamp();
        let period = self.registry.read().opt_out_period();
        let earliest = now.saturating_sub(period);
        let latest = now.saturating_add(self.config.max_future_skew);
        if timestamp < earliest || timestamp > latest {
            return Err(AuthError::IntentExpired { timestamp, now });
        }

        // 4. Signature.
        let signer = verify_intent(intent, domain, signature)?;
        if signer != account {
            return Err(AuthError::SignatureMismatch {
                expected: account,
                recovered: Some(signer),
            });
        }
        Ok(())
    }

    /// [`check`](Self::check), then consume the nonce.
    pub fn verify(
        &mut self,
        caller: Address,
        intent: &BoostedIntent,
        domain: &Eip712Domain,
        signature: &Signature,
    ) -> Result<(), AuthError> {
        if let Err(err) = self.check(caller, intent, domain, signature) {
            warn!(caller = %caller, account = %intent.account(), error = %err, "boosted intent rejected");
            return Err(err);
        }
        let account = intent.account();
        self.nonces.insert(account, intent.nonce());
        debug!(account = %account, nonce = intent.nonce(), kind = ?intent.kind(), "boosted intent accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{shared_registry, ErrorKind};
    use crate::clock::ManualClock;
    use crate::crypto::keys::BoostKeypair;
    use crate::delegation::DelegationRegistry;
    use crate::typed::{sign_intent, IntentBuilder};
    use alloy_primitives::U256;

    const T0: u64 = 1_700_000_000;

    fn booster() -> Address {
        Address::repeat_byte(0xb0)
    }

    fn alice() -> BoostKeypair {
        BoostKeypair::from_seed_phrase("1").unwrap()
    }

    fn domain() -> Eip712Domain {
        Eip712Domain::new("Purpose", Address::repeat_byte(0x42))
    }

    fn verifier() -> (BoostVerifier, ManualClock, SharedRegistry) {
        let clock = ManualClock::new(T0);
        let config = ProtocolConfig::default();
        let registry = shared_registry(DelegationRegistry::from_config(
            Address::repeat_byte(0x0a),
            booster(),
            &config,
        ));
        let verifier = BoostVerifier::new(config, Arc::new(clock.clone()), registry.clone());
        (verifier, clock, registry)
    }

    fn send(nonce: u64, timestamp: u64) -> BoostedIntent {
        IntentBuilder::send(alice().address(), Address::repeat_byte(0xbb), U256::from(5u64))
            .booster(booster())
            .nonce(nonce)
            .timestamp(timestamp)
            .build(&ManualClock::new(T0))
            .unwrap()
    }

    fn signed(intent: &BoostedIntent) -> Signature {
        sign_intent(intent, &domain(), &alice()).unwrap()
    }

    #[test]
    fn test_nonce_consumed_only_on_success() {
        let (mut v, _, _) = verifier();
        let a = alice().address();
        let first = send(1, T0);

        v.check(booster(), &first, &domain(), &signed(&first)).unwrap();
        assert_eq!(v.last_nonce(a), 0);

        v.verify(booster(), &first, &domain(), &signed(&first)).unwrap();
        assert_eq!(v.last_nonce(a), 1);

        // Replay.
        let err = v.verify(booster(), &first, &domain(), &signed(&first)).unwrap_err();
        assert!(matches!(err, AuthError::InvalidNonce { expected: 2, got: 1 }));

        let skipped = send(3, T0);
        assert!(v.verify(booster(), &skipped, &domain(), &signed(&skipped)).is_err());
        assert_eq!(v.last_nonce(a), 1);
    }

    #[test]
    fn test_only_current_delegate_may_submit() {
        let (mut v, _, registry) = verifier();
        let intent = send(1, T0);
        let sig = signed(&intent);

        let err = v.verify(Address::repeat_byte(0xcc), &intent, &domain(), &sig).unwrap_err();
        assert!(matches!(err, AuthError::BoosterMismatch { .. }));

        registry
            .write()
            .instant_opt_out(booster(), alice().address(), T0)
            .unwrap();
        let err = v.verify(booster(), &intent, &domain(), &sig).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_timestamp_window() {
        let (v, _, _) = verifier();
        let period = ProtocolConfig::default().opt_out_period;
        let skew = ProtocolConfig::default().max_future_skew;

        for ts in [T0 - period, T0 + skew] {
            let intent = send(1, ts);
            v.check(booster(), &intent, &domain(), &signed(&intent)).unwrap();
        }
        for ts in [T0 - period - 1, T0 + skew + 1] {
            let intent = send(1, ts);
            let err = v.check(booster(), &intent, &domain(), &signed(&intent)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Expired);
        }
    }

    #[test]
    fn test_signature_of_other_account_rejected() {
        let (v, _, _) = verifier();
        let intent = send(1, T0);
        let mallory = BoostKeypair::from_seed_phrase("2").unwrap();
        let sig = sign_intent(&intent, &domain(), &mallory).unwrap();
        let err = v.check(booster(), &intent, &domain(), &sig).unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch { recovered: Some(r), .. } if r == mallory.address()));
        assert_eq!(err.kind(), ErrorKind::BadSignature);
    }

    #[test]
    fn test_clock_moves_window() {
        let (v, clock, _) = verifier();
        let intent = send(1, T0 + 7_200);
        assert!(v.check(booster(), &intent, &domain(), &signed(&intent)).is_err());
        clock.advance(3_600);
        v.check(booster(), &intent, &domain(), &signed(&intent)).unwrap();
    }

    #[test]
    fn test_timestamp_window_follows_registry_period() {
        let clock = ManualClock::new(T0);
        let registry = shared_registry(DelegationRegistry::new(
            Address::repeat_byte(0x0a),
            booster(),
            600,
        ));
        let v = BoostVerifier::new(ProtocolConfig::default(), Arc::new(clock), registry);

        let fresh = send(1, T0 - 600);
        v.check(booster(), &fresh, &domain(), &signed(&fresh)).unwrap();
        let stale = send(1, T0 - 601);
        let err = v.check(booster(), &stale, &domain(), &signed(&stale)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Expired);
    }
}
