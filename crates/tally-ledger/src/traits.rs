use tally_types::AccountId;

use crate::error::LedgerError;
use crate::records::{Checkpoint, LedgerDelta, LedgerEntry};

/// The view of one open unit of work against the ledger and checkpoint
/// relations.
///
/// All implementations must satisfy these invariants:
/// - Every read within one unit of work observes a single consistent cut of
///   the ledger; the checkpoint read and the scan never mix watermarks from
///   different states.
/// - `append` assigns sequence numbers from one totally ordered counter and
///   never mutates or removes prior entries.
/// - Nothing written through this view is visible to other units of work
///   until the surrounding [`TxStore::with_tx`] commits.
pub trait LedgerTx {
    /// Append an entry, assigning and returning the next sequence number.
    fn append(&mut self, entry: &LedgerEntry) -> Result<u64, LedgerError>;

    /// Sum the entries newer than the given per-side watermarks.
    ///
    /// Credits are entries whose `to_account` is `account` with sequence
    /// strictly greater than `after_credit_seq`; debits mirror this on the
    /// `from_account` side against `after_debit_seq`.
    fn scan_since(
        &mut self,
        account: &AccountId,
        after_credit_seq: u64,
        after_debit_seq: u64,
    ) -> Result<LedgerDelta, LedgerError>;

    /// Read the account's checkpoint, or the zero baseline if none exists.
    /// A missing row is never an error.
    fn checkpoint(&mut self, account: &AccountId) -> Result<Checkpoint, LedgerError>;

    /// Insert or replace the checkpoint row for `checkpoint.account_id`,
    /// unconditionally overwriting all three cached values. Ordering safety
    /// is delegated to the unit of work's isolation, not to this call.
    fn upsert_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<(), LedgerError>;
}

/// Injected provider of atomic units of work.
///
/// `with_tx` is a scoped acquisition: the unit of work commits only when
/// `work` returns `Ok`. An `Err` return, an early `?`, or a panic inside
/// `work` must all discard every staged effect — no partial checkpoint
/// advance and no partial append may survive any exit path.
///
/// Implementations must make concurrent mutating units of work safe against
/// write skew: two withdrawals validating against the same stale balance
/// must never both commit. The provided backends achieve this by running
/// units of work mutually exclusively; a backend relying on optimistic
/// conflict detection instead reports [`LedgerError::Conflict`] so the
/// caller can retry.
pub trait TxStore: Send + Sync {
    /// Run `work` inside one atomic unit of work, committing on `Ok`.
    fn with_tx<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, LedgerError>;
}
