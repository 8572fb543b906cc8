use tracing::debug;

use tally_types::AccountId;

use crate::error::LedgerError;
use crate::reconcile::Reconciler;
use crate::records::LedgerEntry;
use crate::traits::TxStore;

/// The ledger operations: deposit, withdraw, transfer, balance.
///
/// Each call runs as one atomic unit of work against the injected store:
/// checkpoint read, incremental scan, checkpoint write, and (for accepted
/// mutations) one ledger append either all commit together or none do.
/// Every operation — reads included — persists the refreshed checkpoint for
/// the account it reconciles, amortizing future reconciliation cost.
pub struct Ledger<S> {
    store: S,
}

/// Result of the debit-gating step inside withdraw/transfer. The checkpoint
/// refresh commits in both cases; only `Applied` appends an entry.
enum DebitOutcome {
    Applied,
    Insufficient { available: i64 },
}

impl<S: TxStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying transactional store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Credit `amount` to `account`.
    ///
    /// Crediting is always valid, but the checkpoint for `account` is still
    /// refreshed first so future debits start from a fresh baseline. The
    /// appended credit itself stays past the persisted watermark until the
    /// next reconciliation folds it in.
    pub fn deposit(&self, account: &AccountId, amount: i64) -> Result<(), LedgerError> {
        let amount = positive(amount)?;
        self.store.with_tx(|tx| {
            let recon = Reconciler::reconcile(tx, account)?;
            tx.upsert_checkpoint(&recon.checkpoint)?;
            let seq = tx.append(&LedgerEntry::deposit(account.clone(), amount))?;
            debug!(account = %account, amount, seq, "deposit applied");
            Ok(())
        })
    }

    /// Debit `amount` from `account` if the reconciled balance covers it.
    ///
    /// On insufficient funds the unit of work still commits the checkpoint
    /// refresh (balance knowledge is not lost), but no entry is appended and
    /// the call fails with [`LedgerError::InsufficientFunds`].
    pub fn withdraw(&self, account: &AccountId, amount: i64) -> Result<(), LedgerError> {
        let amount = positive(amount)?;
        let outcome = self.store.with_tx(|tx| {
            let recon = Reconciler::reconcile(tx, account)?;
            tx.upsert_checkpoint(&recon.checkpoint)?;
            if recon.balance < amount {
                debug!(account = %account, amount, available = recon.balance, "withdrawal rejected");
                return Ok(DebitOutcome::Insufficient {
                    available: recon.balance,
                });
            }
            let seq = tx.append(&LedgerEntry::withdrawal(account.clone(), amount))?;
            debug!(account = %account, amount, seq, "withdrawal applied");
            Ok(DebitOutcome::Applied)
        })?;

        match outcome {
            DebitOutcome::Applied => Ok(()),
            DebitOutcome::Insufficient { available } => Err(LedgerError::InsufficientFunds {
                available,
                requested: amount,
            }),
        }
    }

    /// Move `amount` from `from` to `to` in a single entry.
    ///
    /// Only the source account gates the transfer: `from` is reconciled and
    /// its checkpoint persisted; `to` needs no balance read to be credited.
    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: i64,
    ) -> Result<(), LedgerError> {
        let amount = positive(amount)?;
        if from == to {
            return Err(LedgerError::SameAccount {
                account: from.clone(),
            });
        }

        let outcome = self.store.with_tx(|tx| {
            let recon = Reconciler::reconcile(tx, from)?;
            tx.upsert_checkpoint(&recon.checkpoint)?;
            if recon.balance < amount {
                debug!(from = %from, to = %to, amount, available = recon.balance, "transfer rejected");
                return Ok(DebitOutcome::Insufficient {
                    available: recon.balance,
                });
            }
            let seq = tx.append(&LedgerEntry::transfer(from.clone(), to.clone(), amount))?;
            debug!(from = %from, to = %to, amount, seq, "transfer applied");
            Ok(DebitOutcome::Applied)
        })?;

        match outcome {
            DebitOutcome::Applied => Ok(()),
            DebitOutcome::Insufficient { available } => Err(LedgerError::InsufficientFunds {
                available,
                requested: amount,
            }),
        }
    }

    /// The account's current balance.
    ///
    /// A read still advances and persists the checkpoint as a side effect;
    /// an account with no prior activity reports 0.
    pub fn balance(&self, account: &AccountId) -> Result<i64, LedgerError> {
        self.store.with_tx(|tx| {
            let recon = Reconciler::reconcile(tx, account)?;
            tx.upsert_checkpoint(&recon.checkpoint)?;
            Ok(recon.balance)
        })
    }
}

/// Zero or negative amounts are rejected before any store access.
fn positive(amount: i64) -> Result<i64, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount { amount });
    }
    Ok(amount)
}
