// crates/eventio-cli/src/main.rs

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "eventio")]
#[command(about = "EventIO block stream tools", long_about = None)]
pub struct Cli {
    /// Log every merged event and per-block details
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge two inputs of the same showers into one, renaming telescopes
    Merge(cmd::merge::MergeArgs),

    /// Trigger type mask side files
    Trgmask(cmd::trgmask::TrgmaskArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // First signal asks the merge loop to stop, a second one terminates.
    let stop = Arc::new(AtomicBool::new(false));
    for sig in TERM_SIGNALS {
        flag::register_conditional_shutdown(*sig, 1, Arc::clone(&stop))?;
        flag::register(*sig, Arc::clone(&stop))?;
    }

    match cli.cmd {
        Commands::Merge(args) => cmd::merge::run(args, cli.verbose, &stop),
        Commands::Trgmask(args) => cmd::trgmask::run(args),
    }
}
