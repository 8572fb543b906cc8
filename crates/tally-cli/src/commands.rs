use anyhow::Context;
use colored::Colorize;

use tally_ledger::Ledger;
use tally_store::SqliteStore;
use tally_types::AccountId;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ledger = Ledger::new(SqliteStore::open(&cli.db).context("open ledger database")?);

    match cli.command {
        Command::Deposit(args) => cmd_deposit(&ledger, args),
        Command::Withdraw(args) => cmd_withdraw(&ledger, args),
        Command::Transfer(args) => cmd_transfer(&ledger, args),
        Command::Balance(args) => cmd_balance(&ledger, args),
    }
}

fn cmd_deposit(ledger: &Ledger<SqliteStore>, args: DepositArgs) -> anyhow::Result<()> {
    let account = parse_account(&args.account)?;
    ledger.deposit(&account, args.amount)?;
    println!(
        "{} Deposited {} to {}",
        "✓".green().bold(),
        args.amount.to_string().bold(),
        account.to_string().yellow()
    );
    Ok(())
}

fn cmd_withdraw(ledger: &Ledger<SqliteStore>, args: WithdrawArgs) -> anyhow::Result<()> {
    let account = parse_account(&args.account)?;
    ledger.withdraw(&account, args.amount)?;
    println!(
        "{} Withdrew {} from {}",
        "✓".green().bold(),
        args.amount.to_string().bold(),
        account.to_string().yellow()
    );
    Ok(())
}

fn cmd_transfer(ledger: &Ledger<SqliteStore>, args: TransferArgs) -> anyhow::Result<()> {
    let from = parse_account(&args.from)?;
    let to = parse_account(&args.to)?;
    ledger.transfer(&from, &to, args.amount)?;
    println!(
        "{} Transferred {} from {} to {}",
        "✓".green().bold(),
        args.amount.to_string().bold(),
        from.to_string().yellow(),
        to.to_string().yellow()
    );
    Ok(())
}

fn cmd_balance(ledger: &Ledger<SqliteStore>, args: BalanceArgs) -> anyhow::Result<()> {
    let account = parse_account(&args.account)?;
    let balance = ledger.balance(&account)?;
    println!("{}: {}", account.to_string().yellow(), balance.to_string().bold());
    Ok(())
}

fn parse_account(raw: &str) -> anyhow::Result<AccountId> {
    AccountId::parse(raw).with_context(|| format!("invalid account id {raw:?}"))
}
