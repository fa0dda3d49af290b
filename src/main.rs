//! der-cert entry point: logging setup and CLI dispatch.

mod cli;

use std::process;

use clap::Parser;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::Cli::parse();
    if let Err(e) = cli::run(args) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
