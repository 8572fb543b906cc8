use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let max_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt().with_max_level(max_level).init();

    commands::run_command(cli)
}
