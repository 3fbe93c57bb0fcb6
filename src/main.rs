use std::process::ExitCode;

use clap::Parser;

use nftcanvas::cli;
use nftcanvas::logger;

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init(log::LevelFilter::Info);

    let args = cli::CliArgs::parse();
    cli::run(args)
}
