use anyhow::Result;
use clap::Parser;
use frame_batch::cli;
use tracing::error;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        error!("{:#}", err);
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
