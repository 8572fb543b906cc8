use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::debug;

use tally_ledger::{Checkpoint, LedgerDelta, LedgerEntry, LedgerError, LedgerTx, TxStore};
use tally_types::AccountId;

/// Two-relation layout: the append-only ledger and the per-account
/// checkpoint memo. The CHECK constraints back up what the record
/// constructors already guarantee.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS ledger_entries (
    id           TEXT PRIMARY KEY,
    sequence     INTEGER NOT NULL UNIQUE,
    from_account TEXT,
    to_account   TEXT,
    amount       INTEGER NOT NULL CHECK (amount > 0),
    created_at   TEXT NOT NULL,
    CHECK (from_account IS NOT NULL OR to_account IS NOT NULL)
);
CREATE INDEX IF NOT EXISTS idx_ledger_entries_credit
    ON ledger_entries (to_account, sequence);
CREATE INDEX IF NOT EXISTS idx_ledger_entries_debit
    ON ledger_entries (from_account, sequence);

CREATE TABLE IF NOT EXISTS account_checkpoints (
    account_id           TEXT PRIMARY KEY,
    last_credit_sequence INTEGER NOT NULL,
    last_debit_sequence  INTEGER NOT NULL,
    cached_balance       INTEGER NOT NULL
);
";

/// Durable SQLite implementation of the `TxStore` boundary.
///
/// Units of work run as `BEGIN IMMEDIATE` transactions on a mutex-guarded
/// connection. The mutex serializes units of work within the process and
/// SQLite's single-writer locking serializes them across processes, so
/// every transaction observes a consistent cut and concurrent withdrawals
/// can never validate against the same stale balance. A writer that loses
/// the cross-process lock race past the busy timeout surfaces
/// [`LedgerError::Conflict`], which callers may retry.
///
/// An uncommitted `rusqlite::Transaction` rolls back when dropped, so every
/// exit path — error, early return, panic — discards the whole unit of work.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) a ledger database at `path` and provision
    /// the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let conn = Connection::open(path).map_err(map_sqlite_err)?;
        Self::init(conn)
    }

    /// Open a private in-memory database, mainly for tests and demos.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, LedgerError> {
        // WAL keeps readers unblocked while a writer holds the database;
        // in-memory databases reject it, hence the .ok().
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(map_sqlite_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(map_sqlite_err)?;
        debug!("ledger schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of committed entries touching `account` on either side.
    pub fn entry_count(&self, account: &AccountId) -> Result<u64, LedgerError> {
        let conn = self.lock_conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM ledger_entries
                 WHERE from_account = ?1 OR to_account = ?1",
                params![account.as_str()],
                |row| row.get(0),
            )
            .map_err(map_sqlite_err)?;
        Ok(count as u64)
    }

    /// The committed checkpoint row for `account`, if one was ever persisted.
    pub fn stored_checkpoint(
        &self,
        account: &AccountId,
    ) -> Result<Option<Checkpoint>, LedgerError> {
        let conn = self.lock_conn()?;
        read_checkpoint_row(&conn, account)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Storage("connection lock poisoned".into()))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl TxStore for SqliteStore {
    fn with_tx<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, LedgerError>,
    {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite_err)?;

        let result = {
            let mut uow = SqliteTx { tx: &tx };
            work(&mut uow)
        };

        match result {
            Ok(value) => {
                tx.commit().map_err(map_sqlite_err)?;
                Ok(value)
            }
            // Dropping `tx` uncommitted rolls the unit of work back.
            Err(err) => Err(err),
        }
    }
}

/// One open unit of work over the SQLite connection.
struct SqliteTx<'a> {
    tx: &'a rusqlite::Transaction<'a>,
}

impl LedgerTx for SqliteTx<'_> {
    fn append(&mut self, entry: &LedgerEntry) -> Result<u64, LedgerError> {
        // Safe under BEGIN IMMEDIATE: this transaction is the only writer,
        // so MAX(sequence)+1 cannot race.
        let sequence: i64 = self
            .tx
            .query_row(
                "SELECT COALESCE(MAX(sequence), 0) + 1 FROM ledger_entries",
                [],
                |row| row.get(0),
            )
            .map_err(map_sqlite_err)?;

        self.tx
            .execute(
                "INSERT INTO ledger_entries
                    (id, sequence, from_account, to_account, amount, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id.to_string(),
                    sequence,
                    entry.from_account.as_ref().map(AccountId::as_str),
                    entry.to_account.as_ref().map(AccountId::as_str),
                    entry.amount,
                    entry.created_at.to_rfc3339(),
                ],
            )
            .map_err(map_sqlite_err)?;

        Ok(sequence as u64)
    }

    fn scan_since(
        &mut self,
        account: &AccountId,
        after_credit_seq: u64,
        after_debit_seq: u64,
    ) -> Result<LedgerDelta, LedgerError> {
        let (credit_sum, max_credit_seq) = self
            .tx
            .query_row(
                "SELECT COALESCE(SUM(amount), 0), COALESCE(MAX(sequence), 0)
                 FROM ledger_entries
                 WHERE to_account = ?1 AND sequence > ?2",
                params![account.as_str(), after_credit_seq as i64],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .map_err(map_sqlite_err)?;

        let (debit_sum, max_debit_seq) = self
            .tx
            .query_row(
                "SELECT COALESCE(SUM(amount), 0), COALESCE(MAX(sequence), 0)
                 FROM ledger_entries
                 WHERE from_account = ?1 AND sequence > ?2",
                params![account.as_str(), after_debit_seq as i64],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .map_err(map_sqlite_err)?;

        Ok(LedgerDelta {
            credit_sum,
            max_credit_seq: max_credit_seq as u64,
            debit_sum,
            max_debit_seq: max_debit_seq as u64,
        })
    }

    fn checkpoint(&mut self, account: &AccountId) -> Result<Checkpoint, LedgerError> {
        Ok(read_checkpoint_row(self.tx, account)?
            .unwrap_or_else(|| Checkpoint::baseline(account.clone())))
    }

    fn upsert_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<(), LedgerError> {
        self.tx
            .execute(
                "INSERT INTO account_checkpoints
                    (account_id, last_credit_sequence, last_debit_sequence, cached_balance)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(account_id) DO UPDATE SET
                    last_credit_sequence = excluded.last_credit_sequence,
                    last_debit_sequence = excluded.last_debit_sequence,
                    cached_balance = excluded.cached_balance",
                params![
                    checkpoint.account_id.as_str(),
                    checkpoint.last_credit_sequence as i64,
                    checkpoint.last_debit_sequence as i64,
                    checkpoint.cached_balance,
                ],
            )
            .map_err(map_sqlite_err)?;
        Ok(())
    }
}

fn read_checkpoint_row(
    conn: &Connection,
    account: &AccountId,
) -> Result<Option<Checkpoint>, LedgerError> {
    conn.query_row(
        "SELECT last_credit_sequence, last_debit_sequence, cached_balance
         FROM account_checkpoints
         WHERE account_id = ?1",
        params![account.as_str()],
        |row| {
            Ok(Checkpoint {
                account_id: account.clone(),
                last_credit_sequence: row.get::<_, i64>(0)? as u64,
                last_debit_sequence: row.get::<_, i64>(1)? as u64,
                cached_balance: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(map_sqlite_err)
}

/// Lock contention is the one failure class a caller can usefully retry;
/// everything else is a storage failure.
fn map_sqlite_err(err: rusqlite::Error) -> LedgerError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            LedgerError::Conflict(err.to_string())
        }
        _ => LedgerError::Storage(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use tally_ledger::Ledger;

    use super::*;

    fn account(name: &str) -> AccountId {
        AccountId::new(name)
    }

    fn ledger() -> Ledger<SqliteStore> {
        Ledger::new(SqliteStore::open_in_memory().unwrap())
    }

    #[test]
    fn open_provisions_schema_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        drop(SqliteStore::open(&path).unwrap());
        // Reopening must not fail on existing tables.
        drop(SqliteStore::open(&path).unwrap());
    }

    #[test]
    fn append_assigns_increasing_sequences() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (s1, s2) = store
            .with_tx(|tx| {
                let s1 = tx.append(&LedgerEntry::deposit(account("a"), 1))?;
                let s2 = tx.append(&LedgerEntry::deposit(account("a"), 2))?;
                Ok((s1, s2))
            })
            .unwrap();
        assert_eq!((s1, s2), (1, 2));
    }

    #[test]
    fn missing_checkpoint_reads_as_baseline() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cp = store
            .with_tx(|tx| tx.checkpoint(&account("ghost")))
            .unwrap();
        assert_eq!(cp, Checkpoint::baseline(account("ghost")));
        assert_eq!(store.stored_checkpoint(&account("ghost")).unwrap(), None);
    }

    #[test]
    fn scan_respects_per_side_watermarks() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .with_tx(|tx| {
                tx.append(&LedgerEntry::deposit(account("a"), 100))?; // seq 1
                tx.append(&LedgerEntry::withdrawal(account("a"), 10))?; // seq 2
                tx.append(&LedgerEntry::deposit(account("a"), 50)) // seq 3
            })
            .unwrap();

        let delta = store
            .with_tx(|tx| tx.scan_since(&account("a"), 1, 0))
            .unwrap();
        assert_eq!(delta.credit_sum, 50);
        assert_eq!(delta.max_credit_seq, 3);
        assert_eq!(delta.debit_sum, 10);
        assert_eq!(delta.max_debit_seq, 2);
    }

    #[test]
    fn failed_unit_of_work_rolls_back_entirely() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result: Result<(), LedgerError> = store.with_tx(|tx| {
            tx.append(&LedgerEntry::deposit(account("a"), 10))?;
            tx.upsert_checkpoint(&Checkpoint {
                account_id: account("a"),
                last_credit_sequence: 1,
                last_debit_sequence: 0,
                cached_balance: 10,
            })?;
            Err(LedgerError::Storage("simulated failure".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.entry_count(&account("a")).unwrap(), 0);
        assert_eq!(store.stored_checkpoint(&account("a")).unwrap(), None);
    }

    #[test]
    fn upsert_overwrites_prior_checkpoint() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cp1 = Checkpoint {
            account_id: account("a"),
            last_credit_sequence: 1,
            last_debit_sequence: 0,
            cached_balance: 10,
        };
        let cp2 = Checkpoint {
            last_credit_sequence: 3,
            last_debit_sequence: 2,
            cached_balance: 4,
            ..cp1.clone()
        };
        store.with_tx(|tx| tx.upsert_checkpoint(&cp1)).unwrap();
        store.with_tx(|tx| tx.upsert_checkpoint(&cp2)).unwrap();
        assert_eq!(
            store.stored_checkpoint(&account("a")).unwrap(),
            Some(cp2)
        );
    }

    // -----------------------------------------------------------------------
    // Full operations against SQLite
    // -----------------------------------------------------------------------

    #[test]
    fn deposit_transfer_withdraw_scenarios() {
        let ledger = ledger();
        ledger.deposit(&account("user1"), 40).unwrap();
        assert_eq!(ledger.balance(&account("user1")).unwrap(), 40);

        ledger
            .transfer(&account("user1"), &account("user2"), 30)
            .unwrap();
        assert_eq!(ledger.balance(&account("user1")).unwrap(), 10);
        assert_eq!(ledger.balance(&account("user2")).unwrap(), 30);

        assert_eq!(
            ledger.withdraw(&account("user1"), 100).unwrap_err(),
            LedgerError::InsufficientFunds {
                available: 10,
                requested: 100
            }
        );
        assert_eq!(ledger.balance(&account("user1")).unwrap(), 10);
    }

    #[test]
    fn deposit_and_full_withdrawal_leave_two_entries() {
        let ledger = ledger();
        ledger.deposit(&account("user3"), 5).unwrap();
        ledger.withdraw(&account("user3"), 5).unwrap();
        assert_eq!(ledger.balance(&account("user3")).unwrap(), 0);
        assert_eq!(ledger.store().entry_count(&account("user3")).unwrap(), 2);
    }

    #[test]
    fn balances_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let ledger = Ledger::new(SqliteStore::open(&path).unwrap());
            ledger.deposit(&account("user1"), 75).unwrap();
        }

        let ledger = Ledger::new(SqliteStore::open(&path).unwrap());
        assert_eq!(ledger.balance(&account("user1")).unwrap(), 75);
    }

    #[test]
    fn concurrent_withdrawals_across_connections_never_both_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let setup = Ledger::new(SqliteStore::open(&path).unwrap());
        setup.deposit(&account("user4"), 100).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                thread::spawn(move || {
                    let ledger = Ledger::new(SqliteStore::open(&path).unwrap());
                    ledger.withdraw(&account("user4"), 100)
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert!(successes <= 1, "double spend: {results:?}");
        for result in &results {
            match result {
                Ok(())
                | Err(LedgerError::InsufficientFunds { .. })
                | Err(LedgerError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let ledger = Ledger::new(SqliteStore::open(&path).unwrap());
        assert!(ledger.balance(&account("user4")).unwrap() >= 0);
    }

    #[test]
    fn shared_store_across_threads() {
        let ledger = Arc::new(ledger());
        ledger.deposit(&account("user4"), 100).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.withdraw(&account("user4"), 100))
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(ledger.balance(&account("user4")).unwrap(), 0);
    }
}
