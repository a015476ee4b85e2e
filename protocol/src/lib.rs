// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Boost Protocol — Core Library
//!
//! Lets an account hand transaction submission to a delegate (a "booster")
//! while keeping the right to take it back. The delegate batches the
//! account's intents as pending operations that only become final once the
//! delegate confirms them or the trust that created them has lapsed.
//!
//! ## Architecture
//!
//! - **delegation** — Who boosts whom: opt-in, opt-out with a grace period,
//!   instant opt-out by the delegate, one-way perma-boost activation.
//! - **ledger** — Per-account window of pending operations. FIFO finalize,
//!   LIFO revert, holes collapse when a boundary reaches them.
//! - **authority** — Finalize/revert guards, signed revert proofs, and the
//!   checks a collaborator runs before executing a boosted intent.
//! - **typed** — Structured intents: building, hashing, ABI encoding,
//!   signing and recovery on the structured and personal-sign paths.
//! - **codec** — Bit-packed mint and burn words for compact audit logs.
//! - **crypto** — Keccak-256, secp256k1 keys and recoverable signatures.
//! - **clock** — Ledger time, real or manual.
//! - **config** — Protocol constants and tunables.
//! - **logging** — `tracing` subscriber setup.
//!
//! Collaborators (token, locker) live in the `boost-contracts` crate and
//! plug in through [`authority::PendingEffects`] and
//! [`authority::ProofRecognizer`].

pub mod authority;
pub mod clock;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod delegation;
pub mod ledger;
pub mod logging;
pub mod typed;
