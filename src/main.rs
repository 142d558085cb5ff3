// dd-php-setup: installs and configures the Datadog tracing library for PHP.
// Parses the command line, initializes logging, and dispatches to the
// subcommand implementations under `commands/`.

mod cli;
mod commands;
mod libs;
mod logger;
mod schemas;
mod utils;

use clap::Parser;
use cli::cmd_enums::{Cli, Commands};
use std::env;
use std::process;

fn main() {
    let cli = Cli::parse();
    logger::init(cli.debug);

    // CI smoke tests only verify the binary starts; skip all side effects.
    if env::var("DD_TEST_EXECUTION")
        .map(|v| utils::is_truthy(&v))
        .unwrap_or(false)
    {
        log_info!("DD_TEST_EXECUTION is set; exiting before any changes.");
        return;
    }

    let result = match &cli.command {
        None => commands::install::run(&cli.install),
        Some(Commands::Install(args)) => commands::install::run(args),
        Some(Commands::Uninstall { php_bin }) => commands::uninstall::run(php_bin),
        Some(Commands::Config { action }) => commands::config::run(action),
    };

    if let Err(message) = result {
        log_error!("{}", message);
        process::exit(1);
    }
}
