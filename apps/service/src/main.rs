#![warn(clippy::all)]

use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;
mod config;
mod output;

use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init_with_level(logger::level_from_verbosity(cli.verbose, cli.quiet));

    let config = match Config::from_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return output::exit(output::EXIT_FAILURE);
        }
    };

    match commands::run(cli.command, config).await {
        Ok(code) => output::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            output::exit(output::EXIT_FAILURE)
        }
    }
}
