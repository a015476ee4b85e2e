//! # Boost Protocol Collaborators
//!
//! Reference collaborators that stage their effects as pending operations
//! of the boost protocol:
//!
//! - **Boosted Token** — balances and supply. Transfers and burns of a
//!   delegated account stay in escrow until finalized or reverted.
//! - **Hodl Locker** — time locks over deposited tokens. Locking, releasing
//!   and withdrawing are staged the same way.
//!
//! Each collaborator owns its own [`Authority`](boost_protocol::authority::Authority)
//! and [`BoostVerifier`](boost_protocol::authority::BoostVerifier) and shares
//! one delegation registry with the others.
//!
//! ## Design Principles
//!
//! 1. All monetary operations use checked arithmetic.
//! 2. A staged effect is recorded before anything else can fail, so commit
//!    and undo never have to guess.
//! 3. Every public type is serializable (serde).

use serde::{Deserialize, Serialize};

pub mod hodl;
pub mod token;

pub use hodl::{HodlError, HodlLocker, Lock};
pub use token::{BoostedToken, TokenError};

/// How a state-changing call took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Execution {
    /// Applied at once.
    Immediate,
    /// Staged as pending operation `op_id` of the account.
    Pending { op_id: u64 },
}

impl Execution {
    pub fn op_id(self) -> Option<u64> {
        match self {
            Execution::Immediate => None,
            Execution::Pending { op_id } => Some(op_id),
        }
    }
}
