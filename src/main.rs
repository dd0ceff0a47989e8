//! `postinst` maintainer-script entry point for the aggregator package.
use std::process::ExitCode;
use std::sync::Arc;

use aggregator_postinst::cli::{Cli, Command};
use aggregator_postinst::{commands, error, logging};
use clap::Parser;

fn main() -> ExitCode {
    let args = Cli::parse();
    let global = args.global.clone();
    let command = args.command_or_default();

    logging::init_subscriber(global.verbose, command.log_name());
    let log = Arc::new(logging::Logger::new(command.log_name()));

    let result = match &command {
        Command::Configure(opts) => commands::configure::run(&global, opts, &log),
        Command::AbortUpgrade(_)
        | Command::AbortRemove(_)
        | Command::AbortDeconfigure(_)
        | Command::Triggered(_) => {
            commands::acknowledge(command.log_name(), &log);
            Ok(())
        }
        Command::Status(opts) => commands::status::run(&global, opts, &log),
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log.error(&format!("postinst failed: {e:#}"));
            ExitCode::from(error::exit_code(&e))
        }
    }
}
