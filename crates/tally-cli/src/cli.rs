use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Tally — checkpointed account balances over an append-only ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the ledger database file.
    #[arg(long, global = true, default_value = "tally.db")]
    pub db: String,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Credit an amount to an account
    Deposit(DepositArgs),
    /// Debit an amount from an account
    Withdraw(WithdrawArgs),
    /// Move an amount between two accounts
    Transfer(TransferArgs),
    /// Show an account's current balance
    Balance(BalanceArgs),
}

#[derive(Args)]
pub struct DepositArgs {
    pub account: String,
    /// Amount in the minor currency unit.
    pub amount: i64,
}

#[derive(Args)]
pub struct WithdrawArgs {
    pub account: String,
    /// Amount in the minor currency unit.
    pub amount: i64,
}

#[derive(Args)]
pub struct TransferArgs {
    pub from: String,
    pub to: String,
    /// Amount in the minor currency unit.
    pub amount: i64,
}

#[derive(Args)]
pub struct BalanceArgs {
    pub account: String,
}
