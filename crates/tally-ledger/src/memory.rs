use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tally_types::AccountId;

use crate::error::LedgerError;
use crate::records::{Checkpoint, LedgerDelta, LedgerEntry};
use crate::traits::{LedgerTx, TxStore};

/// In-memory transactional store for tests, local demos, and embedding.
///
/// The whole state sits behind one mutex held for the duration of each
/// [`TxStore::with_tx`] call, so units of work execute one at a time and
/// every transaction is trivially serializable — two concurrent withdrawals
/// can never validate against the same stale balance. Writes are staged in
/// the unit of work and merged into the base state only on commit; dropping
/// the unit of work without committing discards them, which covers error
/// and panic exits alike. `Conflict` is never reported by this backend.
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_sequence: u64,
    entries: Vec<SequencedEntry>,
    checkpoints: HashMap<AccountId, Checkpoint>,
}

#[derive(Clone)]
struct SequencedEntry {
    sequence: u64,
    entry: LedgerEntry,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Total number of committed ledger entries.
    pub fn len(&self) -> usize {
        self.state.lock().expect("store lock poisoned").entries.len()
    }

    /// Returns `true` if no entry has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of committed entries touching `account` on either side.
    pub fn entry_count(&self, account: &AccountId) -> usize {
        self.state
            .lock()
            .expect("store lock poisoned")
            .entries
            .iter()
            .filter(|row| row.entry.touches(account))
            .count()
    }

    /// The committed checkpoint row for `account`, if one was ever persisted.
    pub fn stored_checkpoint(&self, account: &AccountId) -> Option<Checkpoint> {
        self.state
            .lock()
            .expect("store lock poisoned")
            .checkpoints
            .get(account)
            .cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TxStore for InMemoryStore {
    fn with_tx<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, LedgerError>,
    {
        let base = self
            .state
            .lock()
            .map_err(|_| LedgerError::Storage("store lock poisoned".into()))?;

        let mut tx = MemoryTx {
            next_sequence: base.next_sequence,
            base,
            staged_entries: Vec::new(),
            staged_checkpoints: HashMap::new(),
        };

        // An Err return drops `tx` here, discarding all staged writes.
        let value = work(&mut tx)?;
        tx.commit();
        Ok(value)
    }
}

/// One open unit of work over the in-memory state.
struct MemoryTx<'a> {
    base: MutexGuard<'a, MemoryState>,
    next_sequence: u64,
    staged_entries: Vec<SequencedEntry>,
    staged_checkpoints: HashMap<AccountId, Checkpoint>,
}

impl MemoryTx<'_> {
    fn commit(self) {
        let MemoryTx {
            mut base,
            next_sequence,
            staged_entries,
            staged_checkpoints,
        } = self;

        base.next_sequence = next_sequence;
        base.entries.extend(staged_entries);
        for checkpoint in staged_checkpoints.into_values() {
            base.checkpoints
                .insert(checkpoint.account_id.clone(), checkpoint);
        }
    }
}

impl LedgerTx for MemoryTx<'_> {
    fn append(&mut self, entry: &LedgerEntry) -> Result<u64, LedgerError> {
        self.next_sequence += 1;
        self.staged_entries.push(SequencedEntry {
            sequence: self.next_sequence,
            entry: entry.clone(),
        });
        Ok(self.next_sequence)
    }

    fn scan_since(
        &mut self,
        account: &AccountId,
        after_credit_seq: u64,
        after_debit_seq: u64,
    ) -> Result<LedgerDelta, LedgerError> {
        let mut delta = LedgerDelta::default();
        for row in self.base.entries.iter().chain(self.staged_entries.iter()) {
            if row.sequence > after_credit_seq && row.entry.credits(account) {
                delta.credit_sum += row.entry.amount;
                delta.max_credit_seq = delta.max_credit_seq.max(row.sequence);
            }
            if row.sequence > after_debit_seq && row.entry.debits(account) {
                delta.debit_sum += row.entry.amount;
                delta.max_debit_seq = delta.max_debit_seq.max(row.sequence);
            }
        }
        Ok(delta)
    }

    fn checkpoint(&mut self, account: &AccountId) -> Result<Checkpoint, LedgerError> {
        if let Some(staged) = self.staged_checkpoints.get(account) {
            return Ok(staged.clone());
        }
        Ok(self
            .base
            .checkpoints
            .get(account)
            .cloned()
            .unwrap_or_else(|| Checkpoint::baseline(account.clone())))
    }

    fn upsert_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<(), LedgerError> {
        self.staged_checkpoints
            .insert(checkpoint.account_id.clone(), checkpoint.clone());
        Ok(())
    }
}
