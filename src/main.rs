use std::process::ExitCode;

use clap::Parser;

use capeforge::{cli, logger};

fn main() -> ExitCode {
    // Session log is truncated on every launch
    logger::init();

    let args = cli::CliArgs::parse();
    cli::run(args)
}
