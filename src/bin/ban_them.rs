use std::process;

use structopt::clap::ErrorKind;

use ban_them::app::{self, AppError};
use ban_them::cli::{Cli, CliError};
use ban_them::config::Config;
use ban_them::exit::{codes, exit_code};

/// Permanently ban the IPs fail2ban keeps banning
fn main() {
    let cli = match Cli::parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => match e.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => {
                println!("{}", e.message);
                process::exit(codes::SUCCESS);
            }
            _ => {
                eprintln!("{}", e.message);
                process::exit(codes::USAGE);
            }
        },
    };

    // Initialize logging
    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.print_config {
        match Config::default().to_toml() {
            Ok(rendered) => print!("{}", rendered),
            Err(e) => {
                eprintln!("ERROR: {}", e);
                process::exit(codes::CONFIG_ERROR);
            }
        }
        return;
    }

    match app::run(&cli) {
        Ok(summary) => {
            log::debug!(
                "Run finished: {} admitted, {} banned",
                summary.admitted.len(),
                summary.banned.len()
            );
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            if let AppError::Cli(CliError::InvalidNumber(_)) = e {
                eprintln!("{}", Cli::usage());
            }
            process::exit(exit_code(&e));
        }
    }
}
