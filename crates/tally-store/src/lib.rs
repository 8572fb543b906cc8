//! SQLite-backed transactional store for the Tally ledger.
//!
//! This crate provides [`SqliteStore`], the durable implementation of the
//! `TxStore` boundary from `tally-ledger`. It keeps the two-relation layout
//! (`ledger_entries`, `account_checkpoints`) in a single database file,
//! provisions the schema on open, and runs every unit of work as an
//! immediate-mode SQLite transaction.

pub mod sqlite;

pub use sqlite::SqliteStore;
