//! Integration tests for the delegated operation lifecycle.
//!
//! These tests drive the public API the way a collaborator does: a shared
//! registry, an authority per collaborator, signed intents as revert proofs
//! and a manual clock for time travel. Each test builds its own world.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::Context;

use boost_protocol::authority::{
    shared_registry, AuthError, Authority, BoostVerifier, EffectError, ErrorKind,
    IntentRecognizer, PendingEffects, SharedRegistry,
};
use boost_protocol::clock::ManualClock;
use boost_protocol::config::{ProtocolConfig, OPT_OUT_PERIOD};
use boost_protocol::crypto::BoostKeypair;
use boost_protocol::delegation::{DelegationError, DelegationRegistry};
use boost_protocol::ledger::{OpCounter, PendingOperation};
use boost_protocol::typed::{encode, sign_intent, Eip712Domain, IntentBuilder, IntentKind};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const T0: u64 = 1_700_000_000;

fn owner() -> Address {
    Address::repeat_byte(0x0a)
}

fn booster() -> Address {
    Address::repeat_byte(0xb0)
}

fn carl() -> Address {
    Address::repeat_byte(0xca)
}

/// Deterministic test accounts, one per index.
fn account(i: u32) -> BoostKeypair {
    BoostKeypair::from_seed_phrase(&i.to_string()).expect("test key")
}

fn purpose() -> Eip712Domain {
    Eip712Domain::new("Purpose", Address::repeat_byte(0x11))
}

fn hodl() -> Eip712Domain {
    Eip712Domain::new("Hodl", Address::repeat_byte(0x22))
}

struct World {
    clock: ManualClock,
    registry: SharedRegistry,
    authority: Authority,
}

fn world() -> World {
    let clock = ManualClock::new(T0);
    let config = ProtocolConfig::default();
    let registry = shared_registry(DelegationRegistry::from_config(owner(), booster(), &config));
    let mut authority = Authority::new(config, Arc::new(clock.clone()), registry.clone())
        .expect("valid config");
    authority.register_recognizer(Box::new(IntentRecognizer::new(
        purpose(),
        &[IntentKind::Send, IntentKind::Burn],
    )));
    authority.register_recognizer(Box::new(IntentRecognizer::new(
        hodl(),
        &[IntentKind::Hodl, IntentKind::Release, IntentKind::Withdrawal],
    )));
    World {
        clock,
        registry,
        authority,
    }
}

#[derive(Default)]
struct Journal {
    committed: Vec<u64>,
    undone: Vec<u64>,
}

impl PendingEffects for Journal {
    fn commit(&mut self, op: &PendingOperation) -> Result<(), EffectError> {
        self.committed.push(op.op_id);
        Ok(())
    }

    fn undo(&mut self, op: &PendingOperation) -> Result<(), EffectError> {
        self.undone.push(op.op_id);
        Ok(())
    }
}

fn counter(w: &World, account: Address) -> (u64, u64, u64) {
    let OpCounter {
        value,
        next_finalize,
        next_revert,
    } = w.authority.ledger().op_counter(account);
    (value, next_finalize, next_revert)
}

// ---------------------------------------------------------------------------
// Finalize
// ---------------------------------------------------------------------------

#[test]
fn third_party_finalizes_only_after_opt_out_period() {
    let mut w = world();
    let alice = account(1).address();
    let mut journal = Journal::default();

    let first = w.authority.stage(alice, 2).expect("stage");
    let second = w.authority.stage(alice, 2).expect("stage");

    w.clock.advance(30 * 60);
    w.authority
        .finalize(booster(), alice, first, &mut journal)
        .expect("delegate finalizes");

    let err = w
        .authority
        .finalize(carl(), alice, second, &mut journal)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    w.clock.set(T0 + OPT_OUT_PERIOD + 60);
    w.authority
        .finalize(carl(), alice, second, &mut journal)
        .expect("anyone finalizes after expiry");

    assert_eq!(journal.committed, vec![first, second]);
    assert_eq!(counter(&w, alice), (2, 0, 0));
}

#[test]
fn opt_out_grace_period_keeps_operation_guarded() {
    let mut w = world();
    let alice = account(1).address();
    let id = w.authority.stage(alice, 0).expect("stage");

    w.registry.write().opt_out(alice, T0).expect("opt out");
    w.clock.set(T0 + OPT_OUT_PERIOD - 1);
    assert!(w.authority.can_finalize(carl(), alice, id).is_err());

    // The delegation ended with the grace period, so the guard lifts even
    // though the operation itself is not older than the period.
    w.clock.set(T0 + OPT_OUT_PERIOD);
    assert!(w.authority.can_finalize(carl(), alice, id).is_ok());
}

// ---------------------------------------------------------------------------
// Revert
// ---------------------------------------------------------------------------

#[test]
fn revert_accepts_proof_from_any_recognized_collaborator() {
    let mut w = world();
    let alice = account(1);
    let mut journal = Journal::default();

    for _ in 0..3 {
        w.authority.stage(alice.address(), 0).expect("stage");
    }

    let send = IntentBuilder::send(alice.address(), carl(), U256::from(5u64))
        .booster(booster())
        .nonce(1)
        .build(&w.clock)
        .expect("intent");
    let send_sig = sign_intent(&send, &purpose(), &alice).expect("sign");

    let release = IntentBuilder::release(alice.address(), 7)
        .booster(booster())
        .nonce(1)
        .legacy_signature(true)
        .build(&w.clock)
        .expect("intent");
    let release_sig = sign_intent(&release, &hodl(), &alice).expect("sign");

    w.authority
        .revert(booster(), alice.address(), 3, &encode(&send), &send_sig, &mut journal)
        .expect("revert with send proof");
    w.authority
        .revert(booster(), alice.address(), 2, &encode(&release), &release_sig, &mut journal)
        .expect("revert with legacy release proof");

    // A proof signed for the other domain does not verify.
    let wrong_domain = sign_intent(&send, &hodl(), &alice).expect("sign");
    let err = w
        .authority
        .revert(booster(), alice.address(), 1, &encode(&send), &wrong_domain, &mut journal)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadSignature);

    assert_eq!(journal.undone, vec![3, 2]);
    assert_eq!(counter(&w, alice.address()), (3, 1, 1));
}

#[test]
fn finalized_and_reverted_are_exclusive() {
    let mut w = world();
    let alice = account(1);
    let mut journal = Journal::default();
    let id = w.authority.stage(alice.address(), 1).expect("stage");

    let burn = IntentBuilder::burn(alice.address(), U256::from(1u64))
        .booster(booster())
        .nonce(1)
        .build(&w.clock)
        .expect("intent");
    let sig = sign_intent(&burn, &purpose(), &alice).expect("sign");

    w.authority
        .finalize(booster(), alice.address(), id, &mut journal)
        .expect("finalize");
    let err = w
        .authority
        .revert(booster(), alice.address(), id, &encode(&burn), &sig, &mut journal)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(journal.undone.is_empty());
}

// ---------------------------------------------------------------------------
// Ledger through the authority
// ---------------------------------------------------------------------------

#[test]
fn capacity_is_per_account() {
    let mut w = world();
    let alice = account(1).address();
    let bob = account(2).address();
    let mut journal = Journal::default();

    for _ in 0..25 {
        w.authority.stage(alice, 0).expect("stage");
    }
    let err = w.authority.stage(alice, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);

    // Other accounts are unaffected.
    w.authority.stage(bob, 0).expect("stage");

    // Finalizing the oldest frees a slot, and ids keep counting.
    w.clock.set(T0 + OPT_OUT_PERIOD + 1);
    w.authority
        .finalize(carl(), alice, 1, &mut journal)
        .expect("finalize oldest");
    assert_eq!(w.authority.stage(alice, 0).expect("stage"), 26);
    assert_eq!(counter(&w, alice), (26, 2, 26));
}

#[test]
fn stage_requires_delegation() {
    let mut w = world();
    let alice = account(1).address();

    w.registry
        .write()
        .instant_opt_out(booster(), alice, T0)
        .expect("instant opt-out");
    let err = w.authority.stage(alice, 0).unwrap_err();
    assert!(matches!(err, AuthError::NotDelegated { .. }));

    w.registry.write().opt_in(alice, carl(), T0).expect("opt in");
    let id = w.authority.stage(alice, 0).expect("stage");
    let op = w.authority.ledger().safe_get(alice, id).expect("op");
    assert_eq!(op.delegate_at_creation, carl());
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[test]
fn participants_cannot_redelegate_after_perma_boost() {
    let w = world();
    let collaborator = Address::repeat_byte(0x11);
    let mut registry = w.registry.write();

    registry
        .register_participant(owner(), collaborator)
        .expect("owner registers");
    registry
        .activate_perma_boost_and_renounce(owner())
        .expect("activate");
    assert_eq!(
        registry.register_participant(owner(), carl()),
        Err(DelegationError::NotOwner)
    );

    registry
        .instant_opt_out(booster(), collaborator, T0)
        .expect("drop participant");
    assert_eq!(
        registry.opt_in(collaborator, carl(), T0),
        Err(DelegationError::ParticipantCannotRedelegate(collaborator))
    );
    assert!(registry.status(account(1).address(), T0).perma_boost_active);
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[test]
fn boosted_submission_consumes_nonces_in_order() -> anyhow::Result<()> {
    let w = world();
    let alice = account(1);
    let mut verifier = BoostVerifier::new(
        ProtocolConfig::default(),
        Arc::new(w.clock.clone()),
        w.registry.clone(),
    );

    for nonce in 1..=3 {
        let intent = IntentBuilder::burn(alice.address(), U256::from(nonce))
            .booster(booster())
            .nonce(nonce)
            .build(&w.clock)?;
        let sig = sign_intent(&intent, &purpose(), &alice)?;
        verifier
            .verify(booster(), &intent, &purpose(), &sig)
            .with_context(|| format!("nonce {nonce} rejected"))?;
    }
    assert_eq!(verifier.last_nonce(alice.address()), 3);
    Ok(())
}
