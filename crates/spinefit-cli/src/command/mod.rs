use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use self::{config::ConfigArg, inspect::InspectArg, race::RaceArg, train::TrainArg};

mod config;
mod inspect;
mod race;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log at debug level (overridden by `RUST_LOG`)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Race solver agents against one generated posture
    Race(#[clap(flatten)] RaceArg),
    /// Train a single agent over repeated episodes
    Train(#[clap(flatten)] TrainArg),
    /// Generate one target posture and show its readings
    Inspect(#[clap(flatten)] InspectArg),
    /// Print the default configuration as JSON
    Config(#[clap(flatten)] ConfigArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_tracing(args.verbose);
    match args.mode {
        Mode::Race(arg) => race::run(&arg)?,
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
        Mode::Config(arg) => config::run(&arg)?,
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
