use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_types::{AccountId, EntryId};

/// An immutable record of one monetary movement.
///
/// At least one of `from_account` / `to_account` is present: a deposit has
/// only `to_account`, a withdrawal only `from_account`, a transfer both.
/// The constructors are the only way entries are built in practice, so the
/// invariant holds by construction. Entries are never updated or deleted.
///
/// The ledger's total order comes from a store-assigned sequence number
/// returned by [`crate::traits::LedgerTx::append`], not from `created_at`,
/// which is informational only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub from_account: Option<AccountId>,
    pub to_account: Option<AccountId>,
    /// Positive amount in the minor currency unit.
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// A pure credit: money enters `to` from outside the ledger.
    pub fn deposit(to: AccountId, amount: i64) -> Self {
        Self {
            id: EntryId::new(),
            from_account: None,
            to_account: Some(to),
            amount,
            created_at: Utc::now(),
        }
    }

    /// A pure debit: money leaves `from` to outside the ledger.
    pub fn withdrawal(from: AccountId, amount: i64) -> Self {
        Self {
            id: EntryId::new(),
            from_account: Some(from),
            to_account: None,
            amount,
            created_at: Utc::now(),
        }
    }

    /// An internal movement from `from` to `to`.
    pub fn transfer(from: AccountId, to: AccountId, amount: i64) -> Self {
        Self {
            id: EntryId::new(),
            from_account: Some(from),
            to_account: Some(to),
            amount,
            created_at: Utc::now(),
        }
    }

    /// Classify the entry by which sides are present.
    pub fn kind(&self) -> EntryKind {
        match (&self.from_account, &self.to_account) {
            (Some(_), Some(_)) => EntryKind::Transfer,
            (None, Some(_)) => EntryKind::Deposit,
            (Some(_), None) => EntryKind::Withdrawal,
            (None, None) => unreachable!("entry with neither side"),
        }
    }

    /// Returns `true` if this entry moves money into `account`.
    pub fn credits(&self, account: &AccountId) -> bool {
        self.to_account.as_ref() == Some(account)
    }

    /// Returns `true` if this entry moves money out of `account`.
    pub fn debits(&self, account: &AccountId) -> bool {
        self.from_account.as_ref() == Some(account)
    }

    /// Returns `true` if the entry mentions `account` on either side.
    pub fn touches(&self, account: &AccountId) -> bool {
        self.credits(account) || self.debits(account)
    }
}

/// Classification of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    Transfer,
}

/// Per-account memo of the last reconciled balance.
///
/// `cached_balance` equals the true balance folded from all entries with
/// sequence at or below the respective watermark on each side. Watermarks
/// never decrease across successive persisted checkpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub account_id: AccountId,
    /// Highest sequence already folded in on the credit side.
    pub last_credit_sequence: u64,
    /// Highest sequence already folded in on the debit side.
    pub last_debit_sequence: u64,
    pub cached_balance: i64,
}

impl Checkpoint {
    /// The implicit zero-balance, zero-sequence baseline for an account
    /// that has never been reconciled.
    pub fn baseline(account_id: AccountId) -> Self {
        Self {
            account_id,
            last_credit_sequence: 0,
            last_debit_sequence: 0,
            cached_balance: 0,
        }
    }

    /// The highest sequence this checkpoint reflects on either side.
    pub fn watermark(&self) -> u64 {
        self.last_credit_sequence.max(self.last_debit_sequence)
    }
}

/// Result of scanning ledger entries newer than a checkpoint's watermarks.
///
/// Sequence maxima are 0 when no entry was found on that side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    /// Sum of amounts credited to the account past `after_credit_seq`.
    pub credit_sum: i64,
    pub max_credit_seq: u64,
    /// Sum of amounts debited from the account past `after_debit_seq`.
    pub debit_sum: i64,
    pub max_debit_seq: u64,
}

impl LedgerDelta {
    /// Returns `true` if the scan found no newer entries on either side.
    pub fn is_empty(&self) -> bool {
        self.max_credit_seq == 0 && self.max_debit_seq == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_has_only_destination() {
        let entry = LedgerEntry::deposit(AccountId::new("user1"), 40);
        assert_eq!(entry.kind(), EntryKind::Deposit);
        assert!(entry.from_account.is_none());
        assert_eq!(entry.to_account, Some(AccountId::new("user1")));
    }

    #[test]
    fn withdrawal_has_only_source() {
        let entry = LedgerEntry::withdrawal(AccountId::new("user1"), 40);
        assert_eq!(entry.kind(), EntryKind::Withdrawal);
        assert!(entry.to_account.is_none());
        assert_eq!(entry.from_account, Some(AccountId::new("user1")));
    }

    #[test]
    fn transfer_has_both_sides() {
        let entry = LedgerEntry::transfer(AccountId::new("a"), AccountId::new("b"), 30);
        assert_eq!(entry.kind(), EntryKind::Transfer);
        assert!(entry.credits(&AccountId::new("b")));
        assert!(entry.debits(&AccountId::new("a")));
        assert!(!entry.credits(&AccountId::new("a")));
        assert!(!entry.debits(&AccountId::new("b")));
    }

    #[test]
    fn touches_either_side() {
        let entry = LedgerEntry::transfer(AccountId::new("a"), AccountId::new("b"), 1);
        assert!(entry.touches(&AccountId::new("a")));
        assert!(entry.touches(&AccountId::new("b")));
        assert!(!entry.touches(&AccountId::new("c")));
    }

    #[test]
    fn baseline_checkpoint_is_zeroed() {
        let cp = Checkpoint::baseline(AccountId::new("user1"));
        assert_eq!(cp.last_credit_sequence, 0);
        assert_eq!(cp.last_debit_sequence, 0);
        assert_eq!(cp.cached_balance, 0);
        assert_eq!(cp.watermark(), 0);
    }

    #[test]
    fn watermark_is_max_of_sides() {
        let cp = Checkpoint {
            account_id: AccountId::new("user1"),
            last_credit_sequence: 7,
            last_debit_sequence: 3,
            cached_balance: 10,
        };
        assert_eq!(cp.watermark(), 7);
    }

    #[test]
    fn empty_delta() {
        assert!(LedgerDelta::default().is_empty());
        let delta = LedgerDelta {
            credit_sum: 40,
            max_credit_seq: 1,
            ..Default::default()
        };
        assert!(!delta.is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let entry = LedgerEntry::transfer(AccountId::new("a"), AccountId::new("b"), 30);
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, parsed);

        let cp = Checkpoint::baseline(AccountId::new("a"));
        let json = serde_json::to_string(&cp).unwrap();
        let parsed: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(cp, parsed);
    }
}
