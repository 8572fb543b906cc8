//! Checkpointed account balances over an append-only money ledger.
//!
//! This crate is the heart of Tally. It provides:
//! - Ledger entry and checkpoint record types
//! - The `LedgerTx` / `TxStore` trait boundary for transactional stores
//! - The balance reconciler: checkpoint + incremental scan → current balance
//! - The four ledger operations: deposit, withdraw, transfer, balance
//! - `InMemoryStore` implementation for tests and embedding
//!
//! Every balance in the system is derived state: the append-only ledger is
//! the source of truth, and per-account checkpoints only memoize the fold so
//! a balance query scans entries newer than the checkpoint instead of the
//! full history.

pub mod error;
pub mod memory;
pub mod ops;
pub mod reconcile;
pub mod records;
pub mod traits;

pub use error::LedgerError;
pub use memory::InMemoryStore;
pub use ops::Ledger;
pub use reconcile::{Reconciler, Reconciliation};
pub use records::{Checkpoint, EntryKind, LedgerDelta, LedgerEntry};
pub use traits::{LedgerTx, TxStore};
