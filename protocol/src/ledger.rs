//! # Pending Operation Ledger
//!
//! A bounded, per-account window of in-flight operations.
//!
//! Ids come from a per-account counter that starts at 1 and never goes
//! back. The live window is delimited by two boundaries: `next_finalize`,
//! the oldest live id, and `next_revert`, the newest. Deleting an id inside
//! the window leaves a hole; deleting a boundary moves it inward past every
//! adjacent hole, and an empty window resets both boundaries to 0.
//!
//! ```text
//! ids:    1   2   3   4   5
//! state: [x] [ ] [x] [ ] [x]      x = live, [ ] = hole
//!         ^               ^
//!   next_finalize    next_revert
//! ```
//!
//! Only live entries are stored, in an ordered map keyed by id. Holes take
//! no space, so a window never holds more than `max_pending_ops` entries no
//! matter how far apart its boundaries drift, and a boundary reaches the
//! next live id in O(log n) without visiting the holes in between.
//!
//! The ledger does not care about ordering rules: FIFO finalize and LIFO
//! revert are enforced by [`crate::authority`], not by [`delete`].
//!
//! [`delete`]: PendingOperationLedger::delete

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProtocolConfig;

/// Errors raised by ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// No live operation with this id. Covers both ids that never existed
    /// and ids that were already finalized or reverted.
    #[error("no pending operation {op_id} for {account}")]
    NotFound { account: Address, op_id: u64 },

    #[error("{account} already has {max} pending operations")]
    CapacityExceeded { account: Address, max: usize },
}

/// Per-account counter and window boundaries.
///
/// `next_finalize == 0` iff `next_revert == 0` iff nothing is pending;
/// otherwise `1 <= next_finalize <= next_revert <= value`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpCounter {
    /// Operations ever created; also the most recently issued id.
    pub value: u64,
    pub next_finalize: u64,
    pub next_revert: u64,
}

impl OpCounter {
    pub fn is_empty(&self) -> bool {
        self.next_finalize == 0
    }
}

/// Metadata of one staged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub account: Address,
    pub op_id: u64,
    pub op_type: u8,
    pub delegate_at_creation: Address,
    pub created_at: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AccountWindow {
    counter: OpCounter,
    /// Live entries by id. The first and last keys are the boundaries.
    live: BTreeMap<u64, PendingOperation>,
}

impl AccountWindow {
    fn sync_boundaries(&mut self) {
        let first = self.live.keys().next().copied();
        let last = self.live.keys().next_back().copied();
        self.counter.next_finalize = first.unwrap_or(0);
        self.counter.next_revert = last.unwrap_or(0);
    }
}

/// Pending operations of every account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOperationLedger {
    max_pending_ops: usize,
    windows: HashMap<Address, AccountWindow>,
}

impl Default for PendingOperationLedger {
    fn default() -> Self {
        Self::from_config(&ProtocolConfig::default())
    }
}

impl PendingOperationLedger {
    pub fn new(max_pending_ops: usize) -> Self {
        Self {
            max_pending_ops,
            windows: HashMap::new(),
        }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.max_pending_ops)
    }

    pub fn max_pending_ops(&self) -> usize {
        self.max_pending_ops
    }

    /// Stages a new operation and returns its id.
    pub fn create(
        &mut self,
        account: Address,
        op_type: u8,
        delegate_at_creation: Address,
        now: u64,
    ) -> Result<u64, LedgerError> {
        let max = self.max_pending_ops;
        let window = self.windows.entry(account).or_default();
        if window.live.len() >= max {
            warn!(account = %account, max, "pending operation cap reached");
            return Err(LedgerError::CapacityExceeded { account, max });
        }

        window.counter.value += 1;
        let op_id = window.counter.value;
        window.live.insert(
            op_id,
            PendingOperation {
                account,
                op_id,
                op_type,
                delegate_at_creation,
                created_at: now,
            },
        );
        window.sync_boundaries();

        debug!(
            account = %account,
            op_id,
            op_type,
            delegate = %delegate_at_creation,
            pending = window.live.len(),
            "pending operation created"
        );
        Ok(op_id)
    }

    /// Removes a live operation, moving boundaries past adjacent holes.
    ///
    /// Any live id may be deleted; positional rules belong to the caller.
    pub fn delete(&mut self, account: Address, op_id: u64) -> Result<PendingOperation, LedgerError> {
        let not_found = || LedgerError::NotFound { account, op_id };
        let window = self.windows.get_mut(&account).ok_or_else(not_found)?;
        let removed = window.live.remove(&op_id).ok_or_else(not_found)?;
        window.sync_boundaries();

        debug!(
            account = %account,
            op_id,
            next_finalize = window.counter.next_finalize,
            next_revert = window.counter.next_revert,
            "pending operation deleted"
        );
        Ok(removed)
    }

    /// The operation's metadata, or `None` if it is not pending.
    pub fn get_metadata(&self, account: Address, op_id: u64) -> Option<PendingOperation> {
        self.windows
            .get(&account)
            .and_then(|window| window.live.get(&op_id))
            .copied()
    }

    /// Like [`get_metadata`](Self::get_metadata), but a missing operation
    /// is an error.
    pub fn safe_get(&self, account: Address, op_id: u64) -> Result<PendingOperation, LedgerError> {
        self.get_metadata(account, op_id)
            .ok_or(LedgerError::NotFound { account, op_id })
    }

    pub fn op_counter(&self, account: Address) -> OpCounter {
        self.windows
            .get(&account)
            .map(|window| window.counter)
            .unwrap_or_default()
    }

    pub fn pending_count(&self, account: Address) -> usize {
        self.windows.get(&account).map_or(0, |window| window.live.len())
    }

    /// Live operations of `account`, oldest first.
    pub fn pending(&self, account: Address) -> Vec<PendingOperation> {
        self.windows
            .get(&account)
            .map(|window| window.live.values().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }
    fn delegate() -> Address {
        Address::repeat_byte(0xd0)
    }

    fn counter(value: u64, next_finalize: u64, next_revert: u64) -> OpCounter {
        OpCounter { value, next_finalize, next_revert }
    }

    fn ledger_with(n: u64) -> PendingOperationLedger {
        let mut ledger = PendingOperationLedger::default();
        for i in 1..=n {
            assert_eq!(ledger.create(alice(), 0, delegate(), i).unwrap(), i);
        }
        ledger
    }

    fn assert_boundary_invariant(c: OpCounter) {
        assert_eq!(c.next_finalize == 0, c.next_revert == 0, "{c:?}");
        if c.next_finalize != 0 {
            assert!(1 <= c.next_finalize && c.next_finalize <= c.next_revert && c.next_revert <= c.value, "{c:?}");
        }
    }

    #[test]
    fn test_counter_walkthrough() {
        let mut ledger = ledger_with(5);
        assert_eq!(ledger.op_counter(alice()), counter(5, 1, 5));

        ledger.delete(alice(), 1).unwrap();
        assert_eq!(ledger.op_counter(alice()), counter(5, 2, 5));

        ledger.delete(alice(), 4).unwrap();
        assert_eq!(ledger.op_counter(alice()), counter(5, 2, 5));

        ledger.delete(alice(), 5).unwrap();
        assert_eq!(ledger.op_counter(alice()), counter(5, 2, 3));
    }

    #[test]
    fn test_hole_skip_from_both_ends() {
        let mut ledger = ledger_with(6);
        ledger.delete(alice(), 1).unwrap();
        ledger.delete(alice(), 4).unwrap();
        ledger.delete(alice(), 6).unwrap();
        ledger.delete(alice(), 5).unwrap();
        assert_eq!(ledger.op_counter(alice()), counter(6, 2, 3));
        assert_eq!(ledger.get_metadata(alice(), 4), None);

        ledger.delete(alice(), 3).unwrap();
        ledger.delete(alice(), 2).unwrap();
        assert_eq!(ledger.op_counter(alice()), counter(6, 0, 0));
    }

    #[test]
    fn test_middle_holes_are_skipped_by_finalize_side() {
        let mut ledger = ledger_with(4);
        ledger.delete(alice(), 2).unwrap();
        ledger.delete(alice(), 3).unwrap();
        ledger.delete(alice(), 1).unwrap();
        assert_eq!(ledger.op_counter(alice()), counter(4, 4, 4));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut ledger = ledger_with(2);
        ledger.delete(alice(), 2).unwrap();
        ledger.delete(alice(), 1).unwrap();
        assert_eq!(ledger.op_counter(alice()), counter(2, 0, 0));

        assert_eq!(ledger.create(alice(), 0, delegate(), 10).unwrap(), 3);
        assert_eq!(ledger.op_counter(alice()), counter(3, 3, 3));
    }

    #[test]
    fn test_create_after_trailing_delete_keeps_hole() {
        let mut ledger = ledger_with(3);
        ledger.delete(alice(), 3).unwrap();
        assert_eq!(ledger.create(alice(), 0, delegate(), 10).unwrap(), 4);
        assert_eq!(ledger.op_counter(alice()), counter(4, 1, 4));
        assert_eq!(ledger.get_metadata(alice(), 3), None);

        ledger.delete(alice(), 4).unwrap();
        assert_eq!(ledger.op_counter(alice()), counter(4, 1, 2));
    }

    #[test]
    fn test_metadata_and_safe_get() {
        let ledger = ledger_with(1);
        let op = ledger.get_metadata(alice(), 1).unwrap();
        assert_eq!(op.account, alice());
        assert_eq!(op.delegate_at_creation, delegate());
        assert_eq!(op.created_at, 1);

        assert_eq!(ledger.get_metadata(alice(), 2), None);
        assert_eq!(ledger.get_metadata(delegate(), 1), None);
        assert_eq!(
            ledger.safe_get(alice(), 2),
            Err(LedgerError::NotFound { account: alice(), op_id: 2 })
        );
    }

    #[test]
    fn test_delete_unknown_or_deleted_is_not_found() {
        let mut ledger = ledger_with(3);
        ledger.delete(alice(), 2).unwrap();
        assert_eq!(
            ledger.delete(alice(), 2),
            Err(LedgerError::NotFound { account: alice(), op_id: 2 })
        );
        assert!(ledger.delete(alice(), 9).is_err());
        assert!(ledger.delete(delegate(), 1).is_err());
        assert_eq!(ledger.op_counter(alice()), counter(3, 1, 3));
    }

    #[test]
    fn test_capacity_counts_live_entries() {
        let mut ledger = ledger_with(25);
        assert_eq!(
            ledger.create(alice(), 0, delegate(), 99),
            Err(LedgerError::CapacityExceeded { account: alice(), max: 25 })
        );
        ledger.delete(alice(), 13).unwrap();
        assert_eq!(ledger.create(alice(), 0, delegate(), 100).unwrap(), 26);
        assert_eq!(ledger.pending_count(alice()), 25);

        // Other accounts are unaffected.
        assert_eq!(ledger.create(delegate(), 0, delegate(), 100).unwrap(), 1);
    }

    #[test]
    fn test_boundary_invariant_under_mixed_deletes() {
        let mut ledger = ledger_with(10);
        for id in [5, 1, 10, 2, 9, 7, 3, 4, 8, 6] {
            ledger.delete(alice(), id).unwrap();
            assert_boundary_invariant(ledger.op_counter(alice()));
            let pending = ledger.pending(alice());
            if let (Some(first), Some(last)) = (pending.first(), pending.last()) {
                let c = ledger.op_counter(alice());
                assert_eq!(first.op_id, c.next_finalize);
                assert_eq!(last.op_id, c.next_revert);
            }
        }
        assert_eq!(ledger.op_counter(alice()), counter(10, 0, 0));
    }

    #[test]
    fn test_long_lived_head_keeps_window_small() {
        let mut ledger = ledger_with(1);
        ledger.create(alice(), 0, delegate(), 2).unwrap();
        for id in 3..=10_000u64 {
            assert_eq!(ledger.create(alice(), 0, delegate(), id).unwrap(), id);
            // Middle ids become holes while the head stays live.
            ledger.delete(alice(), id - 1).unwrap();
        }
        assert_eq!(ledger.op_counter(alice()), counter(10_000, 1, 10_000));
        assert_eq!(ledger.pending_count(alice()), 2);
        assert_eq!(ledger.windows[&alice()].live.len(), 2);
        ledger.delete(alice(), 10_000).unwrap();

        // Deleting the head jumps over every hole at once.
        assert_eq!(ledger.create(alice(), 0, delegate(), 1).unwrap(), 10_001);
        ledger.delete(alice(), 1).unwrap();
        assert_eq!(ledger.op_counter(alice()), counter(10_001, 10_001, 10_001));
    }
}
