use tally_types::AccountId;

use crate::error::LedgerError;
use crate::records::Checkpoint;
use crate::traits::LedgerTx;

/// The current balance of an account and the checkpoint that reflects it.
///
/// The checkpoint is a proposal: the caller decides whether and when to
/// persist it via [`LedgerTx::upsert_checkpoint`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    pub balance: i64,
    pub checkpoint: Checkpoint,
}

/// Combines a checkpoint with newer ledger entries into a current balance.
pub struct Reconciler;

impl Reconciler {
    /// Produce the account's current balance and the advanced checkpoint.
    ///
    /// One checkpoint read plus one incremental scan: cost is proportional
    /// to the entries newer than the checkpoint, not to the full history.
    /// Re-running with no new entries yields the same balance and an
    /// unchanged checkpoint, so reconciliation is idempotent; watermarks
    /// only ever move forward.
    pub fn reconcile(
        tx: &mut dyn LedgerTx,
        account: &AccountId,
    ) -> Result<Reconciliation, LedgerError> {
        let cp = tx.checkpoint(account)?;
        let delta = tx.scan_since(account, cp.last_credit_sequence, cp.last_debit_sequence)?;

        let balance = cp.cached_balance + delta.credit_sum - delta.debit_sum;
        let checkpoint = Checkpoint {
            account_id: account.clone(),
            last_credit_sequence: cp.last_credit_sequence.max(delta.max_credit_seq),
            last_debit_sequence: cp.last_debit_sequence.max(delta.max_debit_seq),
            cached_balance: balance,
        };

        Ok(Reconciliation {
            balance,
            checkpoint,
        })
    }
}
